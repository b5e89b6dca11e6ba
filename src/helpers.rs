/// Declare lazily initialised [TypeInfo](crate::TypeInfo) statics.
///
/// Each declaration gives the name of the type and, optionally, the parent types it extends and
/// the contracts it implements. Parents and contracts are other statics declared the same way,
/// their whole hierarchy is included.
///
/// ```
/// use mockstage::type_info;
///
/// type_info! {
///     static SHAPE: "Shape";
///     static DRAWABLE: "Drawable";
///     pub static SQUARE: "Square" extends [SHAPE] implements [DRAWABLE];
/// }
///
/// assert!(SQUARE.satisfies(&"Drawable".into()));
/// ```
#[macro_export]
macro_rules! type_info {
    ($(
        $vis:vis static $id:ident : $name:literal
            $(extends [$($parent:expr),* $(,)?])?
            $(implements [$($contract:expr),* $(,)?])? ;
    )+) => {
        $(
        $vis static $id: $crate::once_cell::sync::Lazy<$crate::TypeInfo> =
            $crate::once_cell::sync::Lazy::new(|| {
                $crate::TypeInfo::new($name)
                    $($(.extends(&$parent))*)?
                    $($(.implements(&$contract))*)?
            });
        )+
    };
}

/// Collect per-request [Overrides](crate::Overrides), by parameter name.
///
/// ```
/// use mockstage::{overrides, Value};
///
/// let overrides = overrides! { "first" => "hi ", "second" => "friend" };
/// assert_eq!(overrides.get("second"), Some(&Value::from("friend")));
/// ```
#[macro_export]
macro_rules! overrides {
    () => {
        $crate::Overrides::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut overrides = $crate::Overrides::new();
        $(
            overrides.insert(::std::string::String::from($name), $crate::Value::from($value));
        )+
        overrides
    }};
}
