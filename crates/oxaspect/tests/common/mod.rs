// Common test utilities for integration tests
//
// Fixture classes mirror a small app model: a `User` with purchase and
// session methods, and a `Dog`/`Corgi` hierarchy where the subclass override
// calls super. Every fixture gets a unique class name so tests can run in
// parallel against the process-wide hook table.

#![allow(dead_code)]

use oxaspect::{Class, Method, Receiver, Result, Selector, Value, root_class};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

static CLASS_ID: AtomicUsize = AtomicUsize::new(0);

/// Returns `prefix` with a process-unique suffix.
pub fn unique_name(prefix: &str) -> String {
    let id = CLASS_ID.fetch_add(1, Ordering::SeqCst);
    format!("{prefix}_{id}")
}

/// Creates a test selector from a string
pub fn sel(name: &str) -> Selector {
    Selector::from_str(name).expect("Failed to create test selector")
}

/// Creates a method from a closure
pub fn method<F>(name: &str, types: &str, imp: F) -> Method
where
    F: Fn(&Receiver, &Selector, &[Value]) -> Result<Value> + Send + Sync + 'static,
{
    Method::new(&sel(name), types, imp).expect("Failed to create test method")
}

/// Shared call counter
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ordered record of what ran
#[derive(Clone, Default)]
pub struct Trail(Arc<Mutex<Vec<String>>>);

impl Trail {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Creates a `User` class whose methods log to `trail`.
///
/// - `buy:price:count:` (`v@:*dq`) logs `buy`
/// - `login:` (`B@:@`) logs `login`, returns whether a name was given
/// - `logout` (`v@:`) logs `logout`
/// - `totalPrice:count:` (`d@:dq`) returns `price * count`
/// - class method `exit` (`v@:`) logs `exit`
pub fn user_class(trail: &Trail) -> Class {
    let class = Class::new(&unique_name("User"), &root_class()).unwrap();

    let t = trail.clone();
    class
        .add_method(method("buy:price:count:", "v@:*dq", move |_, _, _| {
            t.push("buy");
            Ok(Value::Void)
        }))
        .unwrap();

    let t = trail.clone();
    class
        .add_method(method("login:", "B@:@", move |_, _, args| {
            t.push("login");
            Ok(Value::Bool(!args[0].is_nil()))
        }))
        .unwrap();

    let t = trail.clone();
    class
        .add_method(method("logout", "v@:", move |_, _, _| {
            t.push("logout");
            Ok(Value::Void)
        }))
        .unwrap();

    class
        .add_method(method("totalPrice:count:", "d@:dq", |_, _, args| {
            let price = args[0].as_float().unwrap_or_default();
            let count = args[1].as_int().unwrap_or_default();
            Ok(Value::Float(price * count as f64))
        }))
        .unwrap();

    let t = trail.clone();
    class
        .add_class_method(method("exit", "v@:", move |_, _, _| {
            t.push("exit");
            Ok(Value::Void)
        }))
        .unwrap();

    class
}

/// Creates `Dog` and its subclass `Corgi`.
///
/// `Dog.run` logs `Dog.run`; `Corgi.run` logs `Corgi.run` then calls super.
/// `Dog.bark` (`@@:`) returns `"woof"` and is not overridden.
pub fn dog_hierarchy(trail: &Trail) -> (Class, Class) {
    let dog = Class::new(&unique_name("Dog"), &root_class()).unwrap();
    let corgi = Class::new(&unique_name("Corgi"), &dog).unwrap();

    let t = trail.clone();
    dog.add_method(method("run", "v@:", move |_, _, _| {
        t.push("Dog.run");
        Ok(Value::Void)
    }))
    .unwrap();

    dog.add_method(method("bark", "@@:", |_, _, _| Ok("woof".into())))
        .unwrap();

    let t = trail.clone();
    corgi
        .add_method(method("run", "v@:", move |recv, cmd, args| {
            t.push("Corgi.run");
            recv.send_super(&corgi, cmd, args)
        }))
        .unwrap();

    (dog, corgi)
}
