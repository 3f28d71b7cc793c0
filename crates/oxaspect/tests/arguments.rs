// Integration tests for argument and return value fidelity
//
// Every argument a caller passes must reach both the hook callbacks and the
// original implementation unchanged, whatever its encoded type.

mod common;

use common::{Trail, method, sel, unique_name};
use oxaspect::{Block, Class, Error, Object, Position, Value, aspect, root_class};
use std::sync::{Arc, Mutex};

/// Hooks `name` on a fresh class whose original echoes its first argument,
/// and returns what the callback and the original each saw.
fn echo_through_hook(name: &str, types: &str, args: Vec<Value>) -> (Vec<Value>, Value) {
    let class = Class::new(&unique_name("Echo"), &root_class()).unwrap();
    class
        .add_method(method(name, types, |_, _, args| {
            Ok(args.first().cloned().unwrap_or_default())
        }))
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    aspect::hook_class(&class, &sel(name), Position::Before, move |call| {
        *s.lock().unwrap() = call.arguments();
        Ok(())
    })
    .unwrap();

    let out = Object::new(&class).send(&sel(name), &args).unwrap();
    let seen = seen.lock().unwrap().clone();
    (seen, out)
}

#[test]
fn test_string_double_and_integer_arguments() {
    let args = vec![Value::str("MacBook"), Value::Float(10000.23), Value::Int(2)];
    let (seen, out) = echo_through_hook("argsTestBuy:price:count:", "@@:@dq", args.clone());
    assert_eq!(seen, args);
    assert_eq!(out.as_str(), Some("MacBook"));
}

#[test]
fn test_unsigned_and_bool_arguments() {
    let args = vec![Value::UInt(u64::MAX), Value::Bool(true)];
    let (seen, out) = echo_through_hook("argsTestFlag:enabled:", "Q@:QB", args.clone());
    assert_eq!(seen, args);
    assert_eq!(out, Value::UInt(u64::MAX));
}

#[test]
fn test_struct_argument() {
    let rect = Value::Struct(vec![
        Value::Struct(vec![Value::Float(1.0), Value::Float(2.0)]),
        Value::Struct(vec![Value::Float(30.0), Value::Float(40.0)]),
    ]);
    let (seen, out) = echo_through_hook(
        "argsTestFrame:",
        "{CGRect={CGPoint=dd}{CGSize=dd}}@:{CGRect={CGPoint=dd}{CGSize=dd}}",
        vec![rect.clone()],
    );
    assert_eq!(seen, vec![rect.clone()]);
    assert_eq!(out, rect);
}

#[test]
fn test_index_path_like_argument() {
    let path = Value::Array(vec![Value::Int(0), Value::Int(3)]);
    let (seen, out) = echo_through_hook("argsTestSelectRowAt:", "v@:@", vec![path.clone()]);
    assert_eq!(seen, vec![path.clone()]);
    assert_eq!(out, path);
}

#[test]
fn test_selector_pointer_and_nil_arguments() {
    let args = vec![
        Value::Selector(sel("argsTestTarget")),
        Value::Pointer(0xdead_beef),
        Value::Nil,
    ];
    let (seen, out) = echo_through_hook("argsTestPerform:context:sender:", ":@::^v@", args.clone());
    assert_eq!(seen, args);
    assert_eq!(out.as_selector(), Some(sel("argsTestTarget")));
}

#[test]
fn test_block_argument_is_forwarded_and_callable() {
    let class = Class::new(&unique_name("Async"), &root_class()).unwrap();
    let fetch = sel("argsTestFetch:");
    let trail = Trail::default();

    class
        .add_method(method("argsTestFetch:", "v@:@?", |_, _, args| {
            let done = args[0].as_block().cloned();
            if let Some(done) = done {
                done.call(&["payload".into()]);
            }
            Ok(Value::Void)
        }))
        .unwrap();

    let t = trail.clone();
    let completion = Block::new(move |args| {
        t.push(format!("done:{}", args[0].as_str().unwrap_or_default()));
        Value::Void
    });

    let expected = Value::Block(completion.clone());
    let t = trail.clone();
    aspect::hook_class(&class, &fetch, Position::Before, move |call| {
        assert_eq!(call.argument(0), Some(expected.clone()));
        t.push("before");
        Ok(())
    })
    .unwrap();

    Object::new(&class).send(&fetch, &[completion.into()]).unwrap();
    assert_eq!(trail.entries(), vec!["before", "done:payload"]);
}

#[test]
fn test_object_argument_identity() {
    let class = Class::new(&unique_name("Owner"), &root_class()).unwrap();
    let adopt = sel("argsTestAdopt:");
    class
        .add_method(method("argsTestAdopt:", "@@:@", |_, _, args| Ok(args[0].clone())))
        .unwrap();

    let pet = Object::new(&class);
    let expected = pet.clone();
    aspect::hook_class(&class, &adopt, Position::After, move |call| {
        assert_eq!(call.argument(0).as_ref().and_then(Value::as_object), Some(&expected));
        Ok(())
    })
    .unwrap();

    let out = Object::new(&class).send(&adopt, &[pet.clone().into()]).unwrap();
    assert_eq!(out.as_object(), Some(&pet));
}

#[test]
fn test_instead_rewrites_arguments_for_original() {
    let class = Class::new(&unique_name("Calculator"), &root_class()).unwrap();
    let total = sel("argsTestTotal:count:");
    class
        .add_method(method("argsTestTotal:count:", "d@:dq", |_, _, args| {
            let price = args[0].as_float().unwrap_or_default();
            let count = args[1].as_int().unwrap_or_default();
            Ok(Value::Float(price * count as f64))
        }))
        .unwrap();

    aspect::hook_class(&class, &total, Position::Instead, |call| {
        call.set_argument(1, 10)?;
        call.invoke_original()?;
        Ok(())
    })
    .unwrap();

    let out = Object::new(&class)
        .send(&total, &[1.5.into(), 2.into()])
        .unwrap();
    assert_eq!(out, Value::Float(15.0));
}

#[test]
fn test_set_argument_rejects_wrong_type_and_index() {
    let class = Class::new(&unique_name("Strict"), &root_class()).unwrap();
    let name = sel("argsTestName:");
    class
        .add_method(method("argsTestName:", "v@:@", |_, _, _| Ok(Value::Void)))
        .unwrap();

    aspect::hook_class(&class, &name, Position::Before, |call| {
        assert!(matches!(
            call.set_argument(0, 3.5),
            Err(Error::ArgumentTypeMismatch { index: 0, .. })
        ));
        assert!(matches!(
            call.set_argument(1, "extra"),
            Err(Error::ArgumentCountMismatch { .. })
        ));
        call.set_argument(0, "rewritten")
    })
    .unwrap();

    Object::new(&class).send(&name, &["original".into()]).unwrap();
}

#[test]
fn test_hooked_call_still_validates_arguments() {
    let class = Class::new(&unique_name("Validated"), &root_class()).unwrap();
    let count = sel("argsTestCount:");
    class
        .add_method(method("argsTestCount:", "v@:q", |_, _, _| Ok(Value::Void)))
        .unwrap();
    aspect::hook_class(&class, &count, Position::Before, |_| Ok(())).unwrap();

    let err = Object::new(&class).send(&count, &["seven".into()]).unwrap_err();
    assert!(matches!(err, Error::ArgumentTypeMismatch { index: 0, .. }));
}
