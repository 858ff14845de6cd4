//! Shared fixture: a small universe with geometry and bank modules

#![allow(dead_code)]

use std::sync::Arc;

use mirror_types::{
    AttributeEntry, ConstructorDefinition, FieldDefinition, HostError, MethodDefinition, Module,
    Primitive, PropertyDefinition, TypeBuilder, TypeHandle, Universe, Value,
};

/// Marks a type as serializable; inherited by subclasses
#[derive(Debug, PartialEq)]
pub struct Serializable;

/// Free-form category tag
#[derive(Debug, PartialEq)]
pub struct Category(pub &'static str);

pub struct Fixture {
    pub universe: Arc<Universe>,
    pub point: TypeHandle,
    pub shape: TypeHandle,
    pub circle: TypeHandle,
    pub account: TypeHandle,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mirror=debug")
        .with_test_writer()
        .try_init();
}

pub fn fixture() -> Fixture {
    let point = TypeBuilder::class("geometry", "geometry.Point")
        .field(FieldDefinition::new("X", Primitive::I32))
        .field(FieldDefinition::new("Y", Primitive::I32))
        .property(
            PropertyDefinition::new("Sum", Primitive::I64).getter(|this| {
                let obj = this.as_object().ok_or("no instance")?;
                let x = obj.slot(0).and_then(|v| v.as_i32()).unwrap_or(0);
                let y = obj.slot(1).and_then(|v| v.as_i32()).unwrap_or(0);
                Ok(Value::I64(x as i64 + y as i64))
            }),
        )
        .constructor(ConstructorDefinition::empty())
        .build();

    let shape = TypeBuilder::class("geometry", "geometry.Shape")
        .attribute(AttributeEntry::new(Serializable))
        .attribute(AttributeEntry::new(Category("shape")).not_inherited())
        .method(
            MethodDefinition::new("Describe", |_, _| Ok(Value::str("shape")))
                .returns(Primitive::String)
                .attribute(AttributeEntry::new(Category("text"))),
        )
        .constructor(ConstructorDefinition::empty())
        .build();

    let circle = TypeBuilder::subclass("geometry", "geometry.Circle", &shape)
        .field(FieldDefinition::new("Radius", Primitive::F64))
        .method(
            MethodDefinition::new("Describe", |_, _| Ok(Value::str("circle")))
                .returns(Primitive::String),
        )
        .constructor(ConstructorDefinition::empty())
        .build();

    let account = TypeBuilder::class("bank", "bank.Account")
        .field(FieldDefinition::new("Balance", Primitive::I64))
        .field(FieldDefinition::new("Owner", Primitive::String))
        .field(FieldDefinition::new("audits", Primitive::I32).private())
        .field(
            FieldDefinition::new("Currency", Primitive::String)
                .as_static()
                .as_readonly()
                .initial_value(Value::str("EUR")),
        )
        .constructor(ConstructorDefinition::empty())
        .constructor(
            ConstructorDefinition::new(|obj, args| {
                obj.set_slot(0, args[0].clone());
                Ok(())
            })
            .param("balance", Primitive::I64),
        )
        .constructor(
            ConstructorDefinition::new(|obj, args| {
                obj.set_slot(1, args[0].clone());
                Ok(())
            })
            .param("owner", Primitive::String),
        )
        .method(
            MethodDefinition::new("Deposit", |this, args| {
                let obj = this.as_object().ok_or("no instance")?;
                let amount = args[0].as_i64().ok_or("expected i64")?;
                if amount < 0 {
                    return Err(HostError::fault("negative deposit"));
                }
                let balance = obj.slot(0).and_then(|v| v.as_i64()).unwrap_or(0) + amount;
                obj.set_slot(0, Value::I64(balance));
                Ok(Value::I64(balance))
            })
            .param("amount", Primitive::I64)
            .returns(Primitive::I64),
        )
        .method(
            MethodDefinition::new("Audit", |this, _| {
                let obj = this.as_object().ok_or("no instance")?;
                let audits = obj.slot(2).and_then(|v| v.as_i32()).unwrap_or(0) + 1;
                obj.set_slot(2, Value::I32(audits));
                Ok(Value::I32(audits))
            })
            .returns(Primitive::I32)
            .private(),
        )
        .method(
            // Owner for index 0, null otherwise
            MethodDefinition::new("Nickname", |this, args| {
                let obj = this.as_object().ok_or("no instance")?;
                match args[0].as_i32() {
                    Some(0) => Ok(obj.slot(1).unwrap_or(Value::Null)),
                    _ => Ok(Value::Null),
                }
            })
            .param("index", Primitive::I32)
            .returns(Primitive::String),
        )
        .method(
            MethodDefinition::new("Rate", |_, _| Ok(Value::F64(0.025)))
                .returns(Primitive::F64)
                .as_static(),
        )
        .build();

    let universe = Universe::new();
    universe
        .register_module(
            Module::new("geometry")
                .with_type(point.clone())
                .with_type(shape.clone())
                .with_type(circle.clone()),
        )
        .unwrap();
    universe
        .register_module(Module::new("bank").with_type(account.clone()))
        .unwrap();

    Fixture {
        universe: Arc::new(universe),
        point,
        shape,
        circle,
        account,
    }
}
