//! Live introspection over a multi-module universe

use mirror_types::{
    coerce, BindingFlags, FieldDefinition, HostError, MethodDefinition, Module, Object,
    Primitive, TypeBuilder, Universe, Value, CORE_MODULE,
};

fn zoo() -> Universe {
    let animal = TypeBuilder::class("zoo", "zoo.Animal")
        .field(FieldDefinition::new("name", Primitive::String).protected())
        .field(FieldDefinition::new("tag", Primitive::I32).private())
        .method(MethodDefinition::new("Speak", |_, _| Ok(Value::str("..."))).returns(Primitive::String))
        .build();
    let dog = TypeBuilder::subclass("zoo", "zoo.Dog", &animal)
        .field(FieldDefinition::new("Tricks", Primitive::I32))
        .method(MethodDefinition::new("Speak", |_, _| Ok(Value::str("woof"))).returns(Primitive::String))
        .build();
    let universe = Universe::new();
    universe
        .register_module(Module::new("zoo").with_type(animal).with_type(dog))
        .unwrap();
    universe
}

#[test]
fn test_modules_in_registration_order() {
    let universe = zoo();
    let names: Vec<_> = universe
        .modules()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, vec![CORE_MODULE, "zoo"]);
    assert_eq!(universe.primary_name(), CORE_MODULE);

    let err = universe.register_module(Module::new("zoo")).unwrap_err();
    assert!(matches!(err, HostError::DuplicateModule(ref name) if name == "zoo"));
}

#[test]
fn test_inherited_members() {
    let universe = zoo();
    let zoo = universe.module("zoo").unwrap();
    let dog = universe.query_type(&zoo, "zoo.Dog").unwrap();
    let flags = BindingFlags::ALL_INSTANCE;

    // Protected base fields are visible, private ones are not
    assert!(universe.query_field(&dog, "name", flags).is_some());
    assert!(universe.query_field(&dog, "tag", flags).is_none());
    assert!(universe
        .query_field(&dog, "name", flags | BindingFlags::DECLARED_ONLY)
        .is_none());

    let speak = universe.query_method(&dog, "Speak", flags, Some(&[][..])).unwrap();
    assert_eq!(speak.declaring_type().id(), dog.id());
    assert_eq!(universe.query_methods_named(&dog, "Speak", flags).len(), 2);

    let obj = Object::alloc(&dog);
    assert_eq!(obj.slot_count(), 3);
    assert_eq!(universe.type_of(&Value::Object(obj)).unwrap().id(), dog.id());
}

#[test]
fn test_queries_are_counted() {
    let universe = zoo();
    let zoo = universe.module("zoo").unwrap();
    assert_eq!(universe.stats().total(), 0);
    universe.query_type(&zoo, "zoo.Cat");
    let animal = universe.query_type(&zoo, "zoo.Animal").unwrap();
    universe.query_constructors(&animal, BindingFlags::ALL_INSTANCE);
    assert_eq!(universe.stats().type_queries(), 2);
    assert_eq!(universe.stats().member_queries(), 1);
}

#[test]
fn test_argument_coercion() {
    let universe = zoo();
    let i32_ref = universe.primitive(Primitive::I32).type_ref();
    assert_eq!(coerce(&Value::I64(5), &i32_ref), Some(Value::I32(5)));
    assert_eq!(coerce(&Value::I64(i64::MAX), &i32_ref), None);
    assert_eq!(coerce(&Value::str("12"), &i32_ref), Some(Value::I32(12)));
    assert_eq!(coerce(&Value::Null, &i32_ref), None);
}
