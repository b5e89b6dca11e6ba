use std::rc::Rc;

use mockstage::*;

// Describe the types and implement their dynamic interface

type_info! {
    static DEPENDENCY_A: "DependencyA";
    static DEPENDENCY_B: "DependencyB";
    static DEPENDENCY_C: "DependencyC";
    static SERVICE: "Service";
}

struct DependencyA {
    prefix: String,
}

impl Object for DependencyA {
    fn type_info(&self) -> &TypeInfo {
        &DEPENDENCY_A
    }

    fn call(&self, method: &str, _args: Arguments) -> Result<Value, CallError> {
        match method {
            "getPrefix" => Ok(self.prefix.as_str().into()),
            _ => Err(CallError::unknown_method(&DEPENDENCY_A, method)),
        }
    }
}

struct Service {
    a: Rc<dyn Object>,
    #[allow(dead_code)]
    b: Rc<dyn Object>,
}

impl Object for Service {
    fn type_info(&self) -> &TypeInfo {
        &SERVICE
    }

    fn call(&self, method: &str, args: Arguments) -> Result<Value, CallError> {
        match method {
            "targetMethod" => {
                let prefix = self.a.call("getPrefix", Arguments::none())?;
                let world = args.object(0)?.call("sayWorld", [Value::from("!")].into())?;
                Ok(format!(
                    "{}hello {}",
                    prefix.as_str().unwrap_or_default(),
                    world.as_str().unwrap_or_default()
                )
                .into())
            }
            _ => Err(CallError::unknown_method(&SERVICE, method)),
        }
    }
}

fn main() -> Result<(), StageError> {
    // Declare how to build each type, DependencyB and DependencyC are only contracts
    let registry = ClassRegistry::new()
        .contract(&DEPENDENCY_B)
        .contract(&DEPENDENCY_C)
        .class(
            Class::new(&DEPENDENCY_A, |args| {
                Ok(DependencyA {
                    prefix: args.str(0)?.to_owned(),
                })
            })
            .constructor([ParameterDescriptor::untyped("prefix")]),
        )
        .class(
            Class::new(&SERVICE, |args| {
                Ok(Service {
                    a: args.object(0)?,
                    b: args.object(1)?,
                })
            })
            .constructor([
                ParameterDescriptor::typed("a", "DependencyA"),
                ParameterDescriptor::typed("b", "DependencyB"),
            ])
            .method("targetMethod", [ParameterDescriptor::typed("c", "DependencyC")]),
        );

    let mut stage = Stage::new(registry);

    // A real DependencyA, built by the stage itself
    stage.provide_named("prefix", ">>> ")?;
    let a = stage.build("DependencyA")?;

    // DependencyB is left to an empty double, DependencyC answers a single call
    stage.provide(a)?.with_double(
        "DependencyC",
        [CallExpectation::on("sayWorld", [Matcher::from("!")], "worlds!!!")],
    )?;

    let result = stage.build_and_invoke("Service", "targetMethod")?;
    println!("{}", result.as_str().unwrap_or_default());

    stage.verify()?;
    Ok(())
}
