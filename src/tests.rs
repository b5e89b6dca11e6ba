use std::rc::Rc;

use rstest::rstest;

use super::*;

type_info! {
    static EXAMPLE_BASE: "ExampleBase";
    static EXAMPLE_A_INTERFACE: "ExampleAInterface";
    static EXAMPLE_A: "ExampleA" extends [EXAMPLE_BASE] implements [EXAMPLE_A_INTERFACE];
    static EXAMPLE_B: "ExampleB";
    static EXAMPLE_C: "ExampleC";
    static EXAMPLE_D: "ExampleD";
    static EXAMPLE_E: "ExampleE";
    static EXAMPLE_F: "ExampleF";
    static TWIN: "Twin";
    static OPTIONAL: "Optional";
}

struct ExampleA;

impl Object for ExampleA {
    fn type_info(&self) -> &TypeInfo {
        &EXAMPLE_A
    }

    fn call(&self, method: &str, args: Arguments) -> Result<Value, CallError> {
        match method {
            "sayHello" => Ok("hello there".into()),
            "mirror" => {
                args.object(0)?;
                Ok(Value::Null)
            }
            _ => Err(CallError::unknown_method(&EXAMPLE_A, method)),
        }
    }
}

struct ExampleB {
    example_a: Rc<dyn Object>,
}

impl Object for ExampleB {
    fn type_info(&self) -> &TypeInfo {
        &EXAMPLE_B
    }

    fn call(&self, method: &str, _args: Arguments) -> Result<Value, CallError> {
        match method {
            "getExampleA" => Ok(Rc::clone(&self.example_a).into()),
            _ => Err(CallError::unknown_method(&EXAMPLE_B, method)),
        }
    }
}

struct ExampleC {
    one: Rc<dyn Object>,
    two: Rc<dyn Object>,
}

impl Object for ExampleC {
    fn type_info(&self) -> &TypeInfo {
        &EXAMPLE_C
    }

    fn call(&self, method: &str, _args: Arguments) -> Result<Value, CallError> {
        match method {
            "getOne" => Ok(Rc::clone(&self.one).into()),
            "getTwo" => Ok(Rc::clone(&self.two).into()),
            _ => Err(CallError::unknown_method(&EXAMPLE_C, method)),
        }
    }
}

struct ExampleD {
    three: i64,
}

impl Object for ExampleD {
    fn type_info(&self) -> &TypeInfo {
        &EXAMPLE_D
    }

    fn call(&self, method: &str, _args: Arguments) -> Result<Value, CallError> {
        Err(CallError::unknown_method(&EXAMPLE_D, method))
    }
}

struct ExampleE {
    example_a: Rc<dyn Object>,
    example_c: Rc<dyn Object>,
}

impl Object for ExampleE {
    fn type_info(&self) -> &TypeInfo {
        &EXAMPLE_E
    }

    fn call(&self, method: &str, args: Arguments) -> Result<Value, CallError> {
        let example_a = Value::from(Rc::clone(&self.example_a));
        match method {
            "someAction" => {
                example_a.call("sayHello", Arguments::none())?;
                self.example_c.call("getTwo", Arguments::none())?;
                Ok(Value::Null)
            }
            "someFluentAction" => example_a
                .call("fluentOne", Arguments::none())?
                .call("fluentTwo", Arguments::none())?
                .call("sayHello", Arguments::none()),
            "someSelfAction" => {
                example_a.call("mirror", [example_a.clone()])?;
                self.example_c
                    .call("getTwo", Arguments::none())?
                    .call("mirror", [example_a.clone()])
            }
            "concat" => Ok(format!("{}{}", args.str(0)?, args.str(1)?).into()),
            _ => Err(CallError::unknown_method(&EXAMPLE_E, method)),
        }
    }
}

/// Says hello to its constructor dependency
struct ExampleF;

impl Object for ExampleF {
    fn type_info(&self) -> &TypeInfo {
        &EXAMPLE_F
    }

    fn call(&self, method: &str, args: Arguments) -> Result<Value, CallError> {
        match method {
            "getOne" => args.object(0)?.call("sayHello", Arguments::none()),
            _ => Err(CallError::unknown_method(&EXAMPLE_F, method)),
        }
    }
}

/// Two dependencies of the same type
struct Twin {
    left: Rc<dyn Object>,
    right: Rc<dyn Object>,
}

impl Object for Twin {
    fn type_info(&self) -> &TypeInfo {
        &TWIN
    }

    fn call(&self, method: &str, _args: Arguments) -> Result<Value, CallError> {
        Err(CallError::unknown_method(&TWIN, method))
    }
}

/// A typed dependency with a default value
struct Optional {
    helper: Value,
}

impl Object for Optional {
    fn type_info(&self) -> &TypeInfo {
        &OPTIONAL
    }

    fn call(&self, method: &str, _args: Arguments) -> Result<Value, CallError> {
        Err(CallError::unknown_method(&OPTIONAL, method))
    }
}

fn typed(name: &str, ty: &'static str) -> ParameterDescriptor {
    ParameterDescriptor::typed(name, ty)
}

fn registry() -> ClassRegistry {
    ClassRegistry::new()
        .contract(&EXAMPLE_BASE)
        .contract(&EXAMPLE_A_INTERFACE)
        .class(
            Class::new(&EXAMPLE_A, |_| Ok(ExampleA))
                .method("sayHello", [])
                .method("mirror", [typed("exampleA", "ExampleA")]),
        )
        .class(
            Class::new(&EXAMPLE_B, |args| {
                Ok(ExampleB {
                    example_a: args.object(0)?,
                })
            })
            .constructor([typed("exampleA", "ExampleAInterface")])
            .method("getExampleA", []),
        )
        .class(
            Class::new(&EXAMPLE_C, |args| {
                Ok(ExampleC {
                    one: args.object(0)?,
                    two: args.object(1)?,
                })
            })
            .constructor([typed("one", "ExampleAInterface"), typed("two", "ExampleA")])
            .method("getOne", [])
            .method("getTwo", []),
        )
        .class(
            Class::new(&EXAMPLE_D, |args| Ok(ExampleD { three: args.int(2)? })).constructor([
                typed("one", "ExampleAInterface"),
                typed("two", "ExampleA"),
                ParameterDescriptor::untyped("three"),
            ]),
        )
        .class(
            Class::new(&EXAMPLE_E, |args| {
                Ok(ExampleE {
                    example_a: args.object(0)?,
                    example_c: args.object(1)?,
                })
            })
            .constructor([typed("exampleA", "ExampleA"), typed("exampleC", "ExampleC")])
            .method("someAction", [])
            .method("someFluentAction", [])
            .method("someSelfAction", [])
            .method(
                "concat",
                [
                    ParameterDescriptor::untyped("first"),
                    ParameterDescriptor::untyped("second").with_default(" world"),
                ],
            ),
        )
        .class(
            Class::new(&EXAMPLE_F, |args| {
                args.object(0)?.call("sayHello", Arguments::none())?;
                Ok(ExampleF)
            })
            .constructor([typed("exampleA", "ExampleA")])
            .method("getOne", [typed("exampleA", "ExampleA")]),
        )
        .class(
            Class::new(&TWIN, |args| {
                Ok(Twin {
                    left: args.object(0)?,
                    right: args.object(1)?,
                })
            })
            .constructor([typed("left", "ExampleA"), typed("right", "ExampleA")]),
        )
        .class(
            Class::new(&OPTIONAL, |args| {
                Ok(Optional {
                    helper: args.get(0)?.clone(),
                })
            })
            .constructor([typed("helper", "ExampleA").with_default(Value::Null)]),
        )
}

fn stage() -> Stage {
    Stage::new(registry())
}

fn concrete<T: Object>(object: Rc<dyn Object>) -> Rc<T> {
    Value::from(object)
        .downcast::<T>()
        .expect("unexpected concrete type")
}

fn say_hello(response: &str) -> CallExpectation {
    CallExpectation::on("sayHello", [], response)
}

#[test]
fn build_without_registrations() -> Result<(), StageError> {
    let stage = stage();

    let b = concrete::<ExampleB>(stage.build("ExampleB")?);
    assert!(b.example_a.type_info().satisfies(&"ExampleAInterface".into()));

    let c = concrete::<ExampleC>(stage.build("ExampleC")?);
    assert!(!same_object(&c.one, &c.two));
    Ok(())
}

#[test]
fn same_typed_parameters_share_the_provided_instance() -> Result<(), StageError> {
    let mut stage = stage();

    let twin = concrete::<Twin>(stage.build("Twin")?);
    assert!(!same_object(&twin.left, &twin.right));
    assert!(Value::from(Rc::clone(&twin.left)).downcast::<Double>().is_some());

    let provided: Rc<dyn Object> = Rc::new(ExampleA);
    stage.provide(Rc::clone(&provided))?;

    let twin = concrete::<Twin>(stage.build("Twin")?);
    assert!(same_object(&twin.left, &provided));
    assert!(same_object(&twin.right, &provided));
    Ok(())
}

#[test]
fn latest_registration_wins_per_identity() -> Result<(), StageError> {
    let mut stage = stage();

    stage.provide(Value::object(ExampleA))?;
    let c = concrete::<ExampleC>(stage.build("ExampleC")?);
    assert!(same_object(&c.one, &c.two));

    // The interface double only shadows the interface identity
    stage.provide(Value::object(ExampleA))?;
    let interface_double = stage.double("ExampleAInterface", Vec::<Expectation>::new());
    stage.provide(interface_double)?;
    let c = concrete::<ExampleC>(stage.build("ExampleC")?);
    assert!(!same_object(&c.one, &c.two));

    // A double of the class covers the class, its ancestors and its contracts again
    stage.with_double(
        "ExampleA",
        [Expectation::configure(|double| {
            double.expect(say_hello("Goodbye").once());
        })],
    )?;
    let c = concrete::<ExampleC>(stage.build("ExampleC")?);
    assert!(same_object(&c.one, &c.two));
    assert!(stage.table().lookup(&Key::Type("ExampleBase".into()), None)?.is_some());
    assert_eq!(
        c.two.call("sayHello", Arguments::none())?,
        Value::from("Goodbye")
    );
    stage.verify()?;
    Ok(())
}

#[test]
fn untyped_parameter_without_value_fails() {
    let stage = stage();

    match stage.build("ExampleD") {
        Err(StageError::Resolution { site, parameter }) => {
            assert_eq!(site, "ExampleD");
            assert_eq!(parameter, "three");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("ExampleD should not be buildable"),
    }
}

#[test]
fn untyped_method_parameter_without_value_fails() -> Result<(), StageError> {
    let stage = stage();
    let e = stage.build("ExampleE")?;

    match stage.invoke(&e, "concat") {
        Err(StageError::Resolution { site, parameter }) => {
            assert_eq!(site, "ExampleE::concat");
            assert_eq!(parameter, "first");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(value) => panic!("concat should not be callable, got {value:?}"),
    }
    Ok(())
}

#[rstest]
#[case(None, true)]
#[case(Some(Scope::CONSTRUCTOR), true)]
#[case(Some(Scope::CALL), false)]
fn named_values_follow_their_scope(
    #[case] scope: Option<Scope>,
    #[case] visible: bool,
) -> Result<(), StageError> {
    let mut stage = stage();
    match scope {
        None => stage.provide_named("three", 3)?,
        Some(scope) => stage.provide_named_in("three", 3, scope)?,
    };

    match stage.build("ExampleD") {
        Ok(d) => {
            assert!(visible);
            assert_eq!(concrete::<ExampleD>(d).three, 3);
        }
        Err(StageError::Resolution { parameter, .. }) => {
            assert!(!visible);
            assert_eq!(parameter, "three");
        }
        Err(other) => return Err(other),
    }
    Ok(())
}

#[test]
fn provided_instance_is_injected() -> Result<(), StageError> {
    let mut stage = stage();
    let instance: Rc<dyn Object> = Rc::new(ExampleA);
    stage.provide(Rc::clone(&instance))?;

    let b = stage.build("ExampleB")?;
    let injected = stage.invoke(&b, "getExampleA")?;
    assert!(injected.same_object(&Value::from(Rc::clone(&instance))));

    let b = concrete::<ExampleB>(b);
    assert!(same_object(&b.example_a, &instance));
    Ok(())
}

#[rstest]
#[case(Value::type_ref("ExampleA"))]
#[case(Value::from("ExampleA"))]
#[case(Value::List(vec![Value::object(ExampleA)]))]
fn only_instances_can_be_provided(#[case] value: Value) {
    let mut stage = stage();

    let result = stage.provide(value);
    assert!(matches!(result, Err(StageError::InvalidSubstitute { .. })));
}

#[test]
fn unknown_scopes_are_usage_errors() {
    let mut stage = stage();

    let provided = stage.provide_in(Value::object(ExampleA), Scope::named("request"));
    assert!(matches!(provided, Err(StageError::UnknownScope(_))));

    let named = stage.provide_named_in("three", 3, Scope::named("function"));
    assert!(matches!(named, Err(StageError::UnknownScope(_))));

    let doubled = stage.with_double_in("ExampleA", [say_hello("a")], Scope::named("request"));
    assert!(matches!(doubled, Err(StageError::UnknownScope(_))));
}

#[test]
fn collaborators_receive_their_doubles() -> Result<(), StageError> {
    let mut stage = stage();
    let nested = stage.double("ExampleA", Vec::<Expectation>::new());

    stage
        .provide(Value::object(ExampleA))?
        .with_double("ExampleC", [CallExpectation::on("getTwo", [], nested)])?;
    assert_eq!(stage.build_and_invoke("ExampleE", "someAction")?, Value::Null);
    stage.verify()?;
    Ok(())
}

#[test]
fn receiver_is_returned_by_fluent_calls() -> Result<(), StageError> {
    let mut stage = stage();
    stage.with_double(
        "ExampleA",
        [
            CallExpectation::on("fluentOne", [], Receiver),
            CallExpectation::on("fluentTwo", [], Receiver),
            say_hello("hello world"),
        ],
    )?;

    let result = stage.build_and_invoke("ExampleE", "someFluentAction")?;
    assert_eq!(result, Value::from("hello world"));
    stage.verify()?;
    Ok(())
}

#[test]
fn receiver_matches_arguments_of_its_own_type() -> Result<(), StageError> {
    let mut stage = stage();
    let nested = stage.double(
        "ExampleA",
        [CallExpectation::on("mirror", [Matcher::from(Receiver)], ())],
    );
    stage
        .with_double(
            "ExampleA",
            [CallExpectation::on("mirror", [Matcher::from(Receiver)], ())],
        )?
        .with_double("ExampleC", [CallExpectation::on("getTwo", [], nested)])?;

    stage.build_and_invoke("ExampleE", "someSelfAction")?;
    stage.verify()?;
    Ok(())
}

#[test]
fn call_site_values_and_defaults() -> Result<(), StageError> {
    let hello = stage().build_and_invoke_with(
        "ExampleE",
        "concat",
        &overrides! { "first" => "hello" },
    )?;
    assert_eq!(hello, Value::from("hello world"));

    let friend = stage().build_and_invoke_with(
        "ExampleE",
        "concat",
        &overrides! { "first" => "hi ", "second" => "friend" },
    )?;
    assert_eq!(friend, Value::from("hi friend"));
    Ok(())
}

#[test]
fn overrides_win_over_registrations() -> Result<(), StageError> {
    let mut stage = stage();
    stage
        .provide_named("first", "table ")?
        .provide_named_in("second", "call scope", Scope::CALL)?;

    let from_table = stage.build_and_invoke("ExampleE", "concat")?;
    assert_eq!(from_table, Value::from("table call scope"));

    let overridden =
        stage.build_and_invoke_with("ExampleE", "concat", &overrides! { "second" => "override" })?;
    assert_eq!(overridden, Value::from("table override"));

    // Typed constructor parameters can be overridden as well
    let registered: Rc<dyn Object> = Rc::new(ExampleA);
    let explicit: Rc<dyn Object> = Rc::new(ExampleA);
    stage.provide(Rc::clone(&registered))?;
    let b = stage.build_with("ExampleB", &overrides! { "exampleA" => Rc::clone(&explicit) })?;
    assert!(same_object(&concrete::<ExampleB>(b).example_a, &explicit));
    Ok(())
}

#[rstest]
#[case::unscoped(None)]
#[case::constructor(Some(Scope::CONSTRUCTOR))]
fn overrides_win_over_scoped_registrations(#[case] scope: Option<Scope>) -> Result<(), StageError> {
    let mut stage = stage();
    let registered: Rc<dyn Object> = Rc::new(ExampleA);
    match scope {
        None => stage.provide(Rc::clone(&registered))?,
        Some(scope) => stage.provide_in(Rc::clone(&registered), scope)?,
    };

    let b = concrete::<ExampleB>(stage.build("ExampleB")?);
    assert!(same_object(&b.example_a, &registered));

    let explicit: Rc<dyn Object> = Rc::new(ExampleA);
    let b = stage.build_with("ExampleB", &overrides! { "exampleA" => Rc::clone(&explicit) })?;
    assert!(same_object(&concrete::<ExampleB>(b).example_a, &explicit));

    stage.provide_named_in("first", "scoped", Scope::CALL)?;
    let concat = stage.build_and_invoke_with("ExampleE", "concat", &overrides! { "first" => "x" })?;
    assert_eq!(concat, Value::from("x world"));
    Ok(())
}

#[rstest]
#[case::constructor_and_call(Some(Scope::CONSTRUCTOR), Some(Scope::CALL), "b")]
#[case::unscoped_and_call(None, Some(Scope::CALL), "b")]
#[case::unscoped_and_constructor(None, Some(Scope::CONSTRUCTOR), "a")]
fn method_calls_resolve_in_call_scope(
    #[case] first: Option<Scope>,
    #[case] second: Option<Scope>,
    #[case] expected: &str,
) -> Result<(), StageError> {
    let mut stage = stage();
    for (scope, response) in [(first, "a"), (second, "b")] {
        let expectations = [say_hello(response)];
        match scope {
            None => stage.with_double("ExampleA", expectations)?,
            Some(scope) => stage.with_double_in("ExampleA", expectations, scope)?,
        };
    }

    assert_eq!(stage.build_and_invoke("ExampleF", "getOne")?, Value::from(expected));
    stage.verify()?;
    Ok(())
}

#[test]
fn constructor_scope_feeds_the_constructor() -> Result<(), StageError> {
    let mut stage = stage();
    stage
        .with_double_in("ExampleA", [say_hello("a")], Scope::CONSTRUCTOR)?
        .with_double_in("ExampleA", [say_hello("b")], Scope::CALL)?;

    let f = stage.build("ExampleF")?;
    assert_eq!(stage.invoke(&f, "getOne")?, Value::from("b"));
    stage.verify()?;
    Ok(())
}

#[test]
fn typed_default_comes_before_auto_double() -> Result<(), StageError> {
    let mut stage = stage();

    let optional = concrete::<Optional>(stage.build("Optional")?);
    assert!(optional.helper.is_null());

    let instance: Rc<dyn Object> = Rc::new(ExampleA);
    stage.provide(Rc::clone(&instance))?;
    let optional = concrete::<Optional>(stage.build("Optional")?);
    assert!(optional.helper.same_object(&Value::from(instance)));
    Ok(())
}

#[test]
fn resolution_leaves_the_table_untouched() -> Result<(), StageError> {
    let stage = stage();

    stage.build("ExampleE")?;
    stage.build_and_invoke_with("ExampleE", "concat", &overrides! { "first" => "x" })?;
    assert_eq!(stage.table().len(None)?, 0);
    assert_eq!(stage.table().len(Some(&Scope::CONSTRUCTOR))?, 0);
    assert_eq!(stage.table().len(Some(&Scope::CALL))?, 0);
    Ok(())
}

#[test]
fn thrown_errors_reach_the_caller() {
    let mut stage = stage();
    let throw = ThrowExpectation::on("sayHello", [], "RuntimeException")
        .with_message("boom")
        .with_code(7);
    stage
        .with_double("ExampleA", [throw])
        .expect("ExampleA is a valid double");

    match stage.build("ExampleF") {
        Err(StageError::Call(CallError::Thrown(thrown))) => {
            assert_eq!(thrown.message, "boom");
            assert_eq!(thrown.code, 7);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("the constructor should have thrown"),
    }
    assert!(stage.verify().is_ok());
}

#[test]
fn empty_doubles_reject_calls() {
    let stage = stage();

    let result = stage.build("ExampleF");
    assert!(matches!(
        result,
        Err(StageError::Call(CallError::UnexpectedCall { .. }))
    ));
}

#[test]
fn verification_reports_missing_calls() -> Result<(), StageError> {
    let mut stage = stage();
    stage.with_double("ExampleA", [say_hello("hi").times(3)])?;

    stage.build("ExampleF")?;
    let mismatch = stage.verify().unwrap_err();
    assert_eq!(mismatch.method, "sayHello");
    assert_eq!((mismatch.expected, mismatch.received), (3, 1));
    Ok(())
}

#[test]
fn unknown_types_and_methods() -> Result<(), StageError> {
    let stage = stage();

    assert!(matches!(stage.build("Nope"), Err(StageError::UnknownType(_))));
    assert!(matches!(
        stage.build("ExampleAInterface"),
        Err(StageError::NotInstantiable(_))
    ));
    let declared = |ty: &'static str| stage.reflector().get(&ty.into()).map(Class::is_instantiable);
    assert_eq!(declared("ExampleAInterface"), Some(false));
    assert_eq!(declared("ExampleA"), Some(true));
    assert_eq!(declared("Nope"), None);
    assert!(matches!(
        stage.build_and_invoke("ExampleE", "nope"),
        Err(StageError::UnknownMethod { .. })
    ));

    // Doubles of undeclared types only carry their own identity
    let ghost = stage.double("Ghost", Vec::<Expectation>::new());
    assert_eq!(ghost.type_info(), &TypeInfo::new("Ghost"));
    Ok(())
}
