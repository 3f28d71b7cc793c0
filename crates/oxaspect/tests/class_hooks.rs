// Integration tests for class-scope hooks
//
// Covers Before/Instead/After ordering, Instead replacement and original
// invocation, return values, callback failures and class (static) methods.

mod common;

use common::{Counter, Trail, dog_hierarchy, sel, user_class};
use oxaspect::{Error, Object, Position, Value, aspect};

#[test]
fn test_after_hook_runs_after_original() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let buy = sel("buy:price:count:");

    let t = trail.clone();
    aspect::hook_class(&user, &buy, Position::After, move |_| {
        t.push("after");
        Ok(())
    })
    .unwrap();

    Object::new(&user)
        .send(&buy, &["MacBook".into(), 10000.23.into(), 2.into()])
        .unwrap();
    assert_eq!(trail.entries(), vec!["buy", "after"]);
}

#[test]
fn test_before_hook_runs_before_original() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");

    let t = trail.clone();
    aspect::hook_class(&user, &logout, Position::Before, move |_| {
        t.push("before");
        Ok(())
    })
    .unwrap();

    Object::new(&user).send(&logout, &[]).unwrap();
    assert_eq!(trail.entries(), vec!["before", "logout"]);
}

#[test]
fn test_full_order_with_multiple_hooks() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");

    for (position, label) in [
        (Position::After, "after-1"),
        (Position::Before, "before-1"),
        (Position::After, "after-2"),
        (Position::Before, "before-2"),
    ] {
        let t = trail.clone();
        user.hook(&logout, position, move |_| {
            t.push(label);
            Ok(())
        })
        .unwrap();
    }

    Object::new(&user).send(&logout, &[]).unwrap();
    assert_eq!(
        trail.entries(),
        vec!["before-1", "before-2", "logout", "after-1", "after-2"]
    );
}

#[test]
fn test_instead_replaces_original() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");

    let t = trail.clone();
    aspect::hook_class(&user, &logout, Position::Instead, move |_| {
        t.push("instead");
        Ok(())
    })
    .unwrap();

    Object::new(&user).send(&logout, &[]).unwrap();
    assert_eq!(trail.entries(), vec!["instead"]);
}

#[test]
fn test_instead_can_invoke_original() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");

    let t = trail.clone();
    aspect::hook_class(&user, &logout, Position::Instead, move |call| {
        t.push("instead-start");
        call.invoke_original()?;
        t.push("instead-end");
        Ok(())
    })
    .unwrap();

    Object::new(&user).send(&logout, &[]).unwrap();
    assert_eq!(trail.entries(), vec!["instead-start", "logout", "instead-end"]);
}

#[test]
fn test_latest_instead_wins() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");

    for label in ["instead-old", "instead-new"] {
        let t = trail.clone();
        user.hook(&logout, Position::Instead, move |_| {
            t.push(label);
            Ok(())
        })
        .unwrap();
    }

    Object::new(&user).send(&logout, &[]).unwrap();
    assert_eq!(trail.entries(), vec!["instead-new"]);
}

#[test]
fn test_after_sees_and_overrides_return_value() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let total = sel("totalPrice:count:");

    aspect::hook_class(&user, &total, Position::After, |call| {
        let value = call.return_value().as_float().unwrap();
        call.set_return_value(value + 1.0);
        Ok(())
    })
    .unwrap();

    let result = Object::new(&user)
        .send(&total, &[2.5.into(), 4.into()])
        .unwrap();
    assert_eq!(result, Value::Float(11.0));
}

#[test]
fn test_instead_without_original_returns_default() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let login = sel("login:");

    aspect::hook_class(&user, &login, Position::Instead, |_| Ok(())).unwrap();

    let result = Object::new(&user).send(&login, &["alice".into()]).unwrap();
    assert_eq!(result, Value::Bool(false));
    assert!(trail.entries().is_empty());
}

#[test]
fn test_before_cannot_invoke_original() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");
    let seen = Counter::default();

    let s = seen.clone();
    aspect::hook_class(&user, &logout, Position::Before, move |call| {
        assert!(matches!(
            call.invoke_original(),
            Err(Error::OriginalUnavailable { .. })
        ));
        s.hit();
        Ok(())
    })
    .unwrap();

    Object::new(&user).send(&logout, &[]).unwrap();
    assert_eq!(seen.get(), 1);
    assert_eq!(trail.entries(), vec!["logout"]);
}

#[test]
fn test_after_can_invoke_original_again() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");

    aspect::hook_class(&user, &logout, Position::After, |call| {
        assert_eq!(call.original_invocation_count(), 1);
        call.invoke_original()?;
        assert_eq!(call.original_invocation_count(), 2);
        Ok(())
    })
    .unwrap();

    Object::new(&user).send(&logout, &[]).unwrap();
    assert_eq!(trail.entries(), vec!["logout", "logout"]);
}

#[test]
fn test_callback_error_propagates() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");
    let after = Counter::default();

    aspect::hook_class(&user, &logout, Position::Before, |_| {
        Err(Error::exception("SessionException", "already logged out"))
    })
    .unwrap();
    let a = after.clone();
    aspect::hook_class(&user, &logout, Position::After, move |_| {
        a.hit();
        Ok(())
    })
    .unwrap();

    let err = Object::new(&user).send(&logout, &[]).unwrap_err();
    assert_eq!(err, Error::exception("SessionException", "already logged out"));
    assert!(trail.entries().is_empty());
    assert_eq!(after.get(), 0);
}

#[test]
fn test_class_hook_covers_every_instance() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");
    let count = Counter::default();

    let c = count.clone();
    aspect::hook_class(&user, &logout, Position::After, move |_| {
        c.hit();
        Ok(())
    })
    .unwrap();

    for _ in 0..3 {
        Object::new(&user).send(&logout, &[]).unwrap();
    }
    assert_eq!(count.get(), 3);
}

#[test]
fn test_class_hook_covers_inheriting_subclass() {
    let trail = Trail::default();
    let (dog, corgi) = dog_hierarchy(&trail);
    let bark = sel("bark");
    let count = Counter::default();

    let c = count.clone();
    aspect::hook_class(&dog, &bark, Position::After, move |_| {
        c.hit();
        Ok(())
    })
    .unwrap();

    let out = Object::new(&corgi).send(&bark, &[]).unwrap();
    assert_eq!(out.as_str(), Some("woof"));
    assert_eq!(count.get(), 1);
}

#[test]
fn test_hook_class_method() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let exit = sel("exit");
    let count = Counter::default();

    let c = count.clone();
    let t = trail.clone();
    aspect::hook_class(&user, &exit, Position::Before, move |call| {
        assert_eq!(call.instance().as_class(), Some(user));
        assert!(call.object().is_none());
        t.push("before-exit");
        c.hit();
        Ok(())
    })
    .unwrap();

    user.send(&exit, &[]).unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(trail.entries(), vec!["before-exit", "exit"]);

    let hooks = aspect::hooks(&user, &exit);
    assert_eq!(hooks.len(), 1);
    assert!(hooks[0].host.is_metaclass());
}

#[test]
fn test_selector_callback_form() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");
    let seen = Trail::default();

    let s = seen.clone();
    aspect::hook_class_with_selector(&user, &logout, Position::After, move |call, selector| {
        assert_eq!(*selector, call.selector());
        s.push(selector.name());
        Ok(())
    })
    .unwrap();

    Object::new(&user).send(&logout, &[]).unwrap();
    assert_eq!(seen.entries(), vec!["logout"]);
}

#[test]
fn test_hook_installed_from_callback() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");
    let late = Counter::default();

    let l = late.clone();
    aspect::hook_class(&user, &logout, Position::After, move |call| {
        let l = l.clone();
        let class = call.object().unwrap().class();
        if aspect::hooks(&class, &call.selector()).len() == 1 {
            aspect::hook_class(&class, &call.selector(), Position::Before, move |_| {
                l.hit();
                Ok(())
            })?;
        }
        Ok(())
    })
    .unwrap();

    let obj = Object::new(&user);
    obj.send(&logout, &[]).unwrap();
    assert_eq!(late.get(), 0);
    obj.send(&logout, &[]).unwrap();
    assert_eq!(late.get(), 1);
}

#[test]
fn test_callback_sends_hooked_selector_to_sibling() {
    let trail = Trail::default();
    let user = user_class(&trail);
    let logout = sel("logout");
    let count = Counter::default();

    let first = Object::new(&user);
    let sibling = Object::new(&user);
    let first_id = first.id();

    let c = count.clone();
    let forward = sibling.clone();
    aspect::hook_class(&user, &logout, Position::After, move |call| {
        c.hit();
        if call.object().map(Object::id) == Some(first_id) {
            forward.send(&call.selector(), &[])?;
        }
        Ok(())
    })
    .unwrap();

    first.send(&logout, &[]).unwrap();
    assert_eq!(count.get(), 2);
    assert_eq!(trail.entries(), vec!["logout", "logout"]);

    sibling.send(&logout, &[]).unwrap();
    assert_eq!(count.get(), 3);
}
