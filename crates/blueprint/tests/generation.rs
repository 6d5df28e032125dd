//! Generation-time properties of the pipeline generator: source shape,
//! determinism, DI lifting, and the fatal build gates.

mod support;

use std::sync::Arc;

use blueprint::core::ServiceInstance;
use blueprint::prelude::*;
use serde_json::json;
use support::{iinjectable_type, injectable_type, CopyInjectableBuilder, Injectable, StackBuilder};

fn empty_operation() -> TypeRef {
    TypeRef::in_namespace("Acme.Api", "EmptyOperation")
}

fn empty_operation_stack(assembly_name: &str) -> StackBuilder {
    let mut stack = StackBuilder::new(assembly_name);
    stack.handlers.register(
        OperationHandler::new("EmptyOperationHandler", empty_operation(), |_ctx| {
            Box::pin(async { Ok(Some(json!(12345))) })
        })
        .returning(),
    );
    stack
        .operations
        .push(OperationDescriptor::builder("emptyOperation", empty_operation()).build());
    stack
}

#[test]
fn generated_source_is_byte_identical_across_runs() {
    let first = empty_operation_stack("AcmeApi.Det1").build().expect("builds");
    let second = empty_operation_stack("AcmeApi.Det2").build().expect("builds");

    assert_eq!(
        first.what_code_did_i_generate(),
        second.what_code_did_i_generate()
    );
}

#[test]
fn generated_file_carries_the_snapshot_layout() {
    let registry = empty_operation_stack("AcmeApi.Layout")
        .build()
        .expect("builds");
    let source = registry
        .what_code_did_i_generate_for(&empty_operation())
        .expect("known operation");

    let lines: Vec<&str> = source.lines().collect();
    assert_eq!(lines[0], "// <auto-generated />");
    assert_eq!(lines[1], "// Acme.Generated.EmptyOperationExecutor");

    let usings: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| l.starts_with("using "))
        .collect();
    let mut sorted = usings.clone();
    sorted.sort_unstable();
    assert_eq!(usings, sorted, "using declarations must be sorted");
    assert!(source.contains("namespace Acme.Generated"));
}

#[test]
fn singleton_service_is_lifted_to_the_constructor() {
    let mut stack = empty_operation_stack("AcmeApi.Singleton");
    stack.services.singleton(
        iinjectable_type(),
        injectable_type(),
        Arc::new(Injectable {
            tag: "singleton".into(),
        }) as ServiceInstance,
    );
    stack.extra_builders.push((
        MiddlewareStage::PreExecute,
        Arc::new(CopyInjectableBuilder {
            services: vec![iinjectable_type()],
        }),
    ));

    let registry = stack.build().expect("builds");
    let source = registry
        .what_code_did_i_generate_for(&empty_operation())
        .expect("known operation");

    assert!(
        !source.contains("context.ServiceProvider.GetRequiredService<IInjectable>"),
        "singleton must not resolve from the scope:\n{source}"
    );
    assert!(
        source.contains("IInjectable iInjectable"),
        "singleton must appear as a constructor parameter:\n{source}"
    );
}

#[test]
fn transient_service_resolves_from_the_scope() {
    let mut stack = empty_operation_stack("AcmeApi.Transient");
    stack.services.transient(
        iinjectable_type(),
        injectable_type(),
        Arc::new(|| {
            Arc::new(Injectable {
                tag: "transient".into(),
            }) as ServiceInstance
        }),
    );
    stack.extra_builders.push((
        MiddlewareStage::PreExecute,
        Arc::new(CopyInjectableBuilder {
            services: vec![iinjectable_type()],
        }),
    ));

    let registry = stack.build().expect("builds");
    let source = registry
        .what_code_did_i_generate_for(&empty_operation())
        .expect("known operation");

    assert!(
        source.contains("context.ServiceProvider.GetRequiredService<IInjectable>"),
        "transient must resolve from the scope:\n{source}"
    );
    assert!(
        !source.contains("private readonly IInjectable"),
        "transient must not be a constructor field:\n{source}"
    );
}

#[test]
fn duplicate_constructor_argument_fails_the_build() {
    let mut stack = empty_operation_stack("AcmeApi.Duplicate");
    let instance = Arc::new(Injectable {
        tag: "shared".into(),
    });
    stack.services.singleton(
        iinjectable_type(),
        injectable_type(),
        Arc::clone(&instance) as ServiceInstance,
    );
    stack.services.singleton(
        injectable_type(),
        injectable_type(),
        instance as ServiceInstance,
    );
    stack.extra_builders.push((
        MiddlewareStage::PreExecute,
        Arc::new(CopyInjectableBuilder {
            services: vec![iinjectable_type(), injectable_type()],
        }),
    ));

    let err = stack.build().expect_err("must fail");
    let message = err.to_string();
    assert!(
        message.contains("duplicate constructor argument"),
        "unexpected message: {message}"
    );
    assert!(message.contains("Acme.Services.IInjectable"));
    assert!(message.contains("Acme.Services.Injectable"));
}

#[test]
fn polymorphic_handlers_are_emitted_base_first_without_casts() {
    let base = TypeRef::in_namespace("Acme.Api", "OperationBase");
    let child = TypeRef::in_namespace("Acme.Api", "OperationChild2");

    let mut stack = StackBuilder::new("AcmeApi.Poly");
    stack.handlers.register(OperationHandler::new(
        "OperationChild2Handler",
        child.clone(),
        |_ctx| Box::pin(async { Ok(None) }),
    ));
    stack.handlers.register(OperationHandler::new(
        "OperationBaseHandler",
        base.clone(),
        |_ctx| Box::pin(async { Ok(None) }),
    ));
    stack.operations.push(
        OperationDescriptor::builder("operationBase", base.clone()).build(),
    );
    stack.operations.push(
        OperationDescriptor::builder("operationChild2", child.clone())
            .base_type(base)
            .build(),
    );

    let registry = stack.build().expect("builds");
    let source = registry
        .what_code_did_i_generate_for(&child)
        .expect("known operation");

    let base_call = source
        .find("await OperationBaseHandler.HandleAsync(context);")
        .expect("base handler call emitted");
    let child_call = source
        .find("await OperationChild2Handler.HandleAsync(context);")
        .expect("child handler call emitted");
    assert!(base_call < child_call, "base handler must be called first");
    assert!(
        !source.contains(" is OperationChild2") && !source.contains("(OperationChild2)"),
        "no type test or cast may guard the calls:\n{source}"
    );
}

#[test]
fn interface_operation_with_subtype_handler_fails_the_return_value_gate() {
    let interface = TypeRef::in_namespace("Acme.Api", "IPolymorphicOperation");
    let concrete = TypeRef::in_namespace("Acme.Api", "ConcreteOperation");

    let mut stack = StackBuilder::new("AcmeApi.Gate");
    stack.handlers.register(
        OperationHandler::new("ConcreteOperationHandler", concrete, |_ctx| {
            Box::pin(async { Ok(Some(json!(1))) })
        })
        .returning(),
    );
    stack.operations.push(
        OperationDescriptor::builder("polymorphic", interface)
            .requires_return_value()
            .build(),
    );

    let err = stack.build().expect_err("must fail");
    let message = err.to_string();
    assert!(message.contains("requires a return value"));
    assert!(
        message.contains("ConcreteOperationHandler"),
        "message should name the mismatched handler: {message}"
    );
    assert!(
        message.contains("interface or base class"),
        "message should explain the interface-to-concrete mismatch: {message}"
    );
}

#[test]
fn compilation_failures_attach_the_offending_source() {
    // Two operations whose payload types collide on the simple name land
    // on the same (namespace, typeName) pair; the compiler rejects the
    // duplicate and the error carries the full generated source.
    let first = TypeRef::in_namespace("Acme.Api", "SameName");
    let second = TypeRef::in_namespace("Acme.Other", "SameName");

    let mut stack = StackBuilder::new("AcmeApi.Collide");
    for (name, payload) in [("first", first.clone()), ("second", second.clone())] {
        stack.handlers.register(OperationHandler::new(
            format!("{name}Handler"),
            payload.clone(),
            |_ctx| Box::pin(async { Ok(None) }),
        ));
        stack
            .operations
            .push(OperationDescriptor::builder(name, payload).build());
    }

    let err = stack.build().expect_err("must fail");
    match err {
        GenerationError::Compilation {
            diagnostics,
            source_code,
        } => {
            assert!(diagnostics.iter().any(|d| d.message.contains("duplicate type")));
            assert!(source_code.contains("SameNameExecutor"));
        }
        other => panic!("expected a compilation error, got: {other}"),
    }
}
