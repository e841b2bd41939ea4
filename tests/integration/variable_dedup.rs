//! Duplicate-write suppression composed with `connect()`'s converter
//! wiring: a repeated write to the upstream side must not even reach the
//! converter, let alone re-publish to the downstream side.

use hbus::core::{connect, ConversionRegistry, Endpoint, Origin, Value, ValueKind, Variable};

#[tokio::test]
async fn duplicate_upstream_write_never_reaches_a_converted_downstream() {
    let switch = Variable::new(ValueKind::Bool, "switch");
    let level = Variable::new(ValueKind::Int, "level");

    let conversions = ConversionRegistry::with_standard_conversions();
    let mut a = Endpoint::new(ValueKind::Bool);
    a.subscribable = Some(switch.clone());
    let mut b = Endpoint::new(ValueKind::Int);
    b.writable = Some(level.clone());
    connect(&a, &b, &conversions).unwrap();

    switch.write(Value::Bool(true), Origin::root()).await.unwrap();
    assert_eq!(level.current().await, Some(Value::Int(1)));

    // Flip the downstream out of band so a missed re-publish is visible.
    level.write(Value::Int(99), Origin::root()).await.unwrap();

    switch.write(Value::Bool(true), Origin::root()).await.unwrap();
    assert_eq!(
        level.current().await,
        Some(Value::Int(99)),
        "repeated identical upstream write must not re-run the converter and re-publish"
    );

    switch.write(Value::Bool(false), Origin::root()).await.unwrap();
    assert_eq!(level.current().await, Some(Value::Int(0)), "a genuinely new upstream value must still propagate");
}

#[tokio::test]
async fn dedup_is_by_structural_equality_not_identity() {
    let var = Variable::new(ValueKind::Str, "name");
    let downstream = Variable::new(ValueKind::Str, "mirror");
    var.subscribe(downstream.clone(), None);

    var.write(Value::Str("hello".to_owned()), Origin::root()).await.unwrap();
    assert_eq!(downstream.current().await, Some(Value::Str("hello".to_owned())));

    downstream.write(Value::Str("clobbered".to_owned()), Origin::root()).await.unwrap();

    // A freshly allocated String equal in content to the stored one still
    // counts as a duplicate.
    var.write(Value::Str(String::from("hello")), Origin::root()).await.unwrap();
    assert_eq!(downstream.current().await, Some(Value::Str("clobbered".to_owned())));
}
