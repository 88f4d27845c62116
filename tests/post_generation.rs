//! Post-generation behavior: deferred hooks, related factories and method
//! calls applied to the already-built object.

use std::sync::{Arc, Mutex};

use fabrica::overrides;
use fabrica::prelude::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
fn test_hooks_run_in_declaration_order_and_see_prior_effects() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set("username", "alice")
		.set(
			"assign_group",
			Declaration::post_hook(|obj, _ctx| {
				obj.set("group", "staff");
				Ok(())
			}),
		)
		.set(
			"describe",
			Declaration::post_hook(|obj, _ctx| {
				let group = obj
					.get("group")
					.and_then(|v| v.as_str())
					.unwrap_or("none")
					.to_string();
				obj.set("description", format!("member of {group}"));
				Ok(())
			}),
		)
		.finish();

	let object = factory.build().unwrap();
	assert_eq!(object.get("description"), Some(&json!("member of staff")));
}

#[rstest]
fn test_hook_observes_create_flag_extracted_and_kwargs() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set(
			"password",
			Declaration::post_hook(|obj, ctx| {
				let raw = match ctx.extracted {
					Some(value) => value.clone(),
					None => json!("default"),
				};
				obj.set("password", raw);
				obj.set("persist_requested", ctx.create);
				if let Some(algo) = ctx.kwargs.get("algorithm") {
					obj.set("algorithm", algo.clone());
				}
				Ok(())
			}),
		)
		.finish();

	let built = factory
		.build_with(overrides! {
			"password" => "hunter2",
			"password__algorithm" => "argon2",
		})
		.unwrap();
	assert_eq!(built.get("password"), Some(&json!("hunter2")));
	assert_eq!(built.get("persist_requested"), Some(&json!(false)));
	assert_eq!(built.get("algorithm"), Some(&json!("argon2")));

	let created = factory.create().unwrap();
	assert_eq!(created.get("password"), Some(&json!("default")));
	assert_eq!(created.get("persist_requested"), Some(&json!(true)));
}

#[rstest]
fn test_explicit_null_override_is_distinguishable_from_absence() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set(
			"note",
			Declaration::post_hook(|obj, ctx| {
				obj.set(
					"note_supplied",
					match ctx.extracted {
						Some(_) => "supplied",
						None => "absent",
					},
				);
				Ok(())
			}),
		)
		.finish();

	let absent = factory.build().unwrap();
	assert_eq!(absent.get("note_supplied"), Some(&json!("absent")));

	let null = factory
		.build_with(overrides! { "note" => json!(null) })
		.unwrap();
	assert_eq!(null.get("note_supplied"), Some(&json!("supplied")));
}

#[rstest]
fn test_value_shadowing_inherited_hook_becomes_default_extracted() {
	let base = Factory::builder("users.BaseFactory")
		.model(RecordTarget::new("users.User"))
		.set(
			"password",
			Declaration::post_hook(|obj, ctx| {
				let raw = ctx
					.extracted
					.and_then(|v| v.as_str())
					.unwrap_or("random")
					.to_string();
				obj.set("password", format!("#{raw}"));
				Ok(())
			}),
		)
		.finish();
	let child = Factory::builder("users.ChildFactory")
		.parent(&base)
		.set("password", "letmein")
		.finish();

	let object = child.build().unwrap();
	assert_eq!(object.get("password"), Some(&json!("#letmein")));
}

fn related_pair() -> (Factory, Arc<Mutex<Vec<serde_json::Value>>>) {
	let log: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
	let seen = log.clone();
	let profile = Factory::builder("profiles.ProfileFactory")
		.model(
			RecordTarget::new("profiles.Profile").with_save(move |obj| {
				seen.lock().unwrap().push(obj.to_value());
				Ok(())
			}),
		)
		.set("bio", "empty")
		.finish();
	let user = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set("username", "alice")
		.set(
			"profile",
			Related::new(&profile, "user").set("bio", "fresh"),
		)
		.finish();
	(user, log)
}

#[rstest]
fn test_related_factory_injects_the_primary_object() {
	let (user, log) = related_pair();
	user.create().unwrap();

	let entries = log.lock().unwrap();
	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0]["bio"], json!("fresh"));
	assert_eq!(entries[0]["user"]["username"], json!("alice"));
}

#[rstest]
fn test_related_factory_accepts_routed_overrides() {
	let (user, log) = related_pair();
	user.create_with(overrides! { "profile__bio" => "custom" })
		.unwrap();
	assert_eq!(log.lock().unwrap()[0]["bio"], json!("custom"));
}

#[rstest]
fn test_related_factory_skipped_when_value_supplied() {
	let (user, log) = related_pair();
	let object = user
		.create_with(overrides! {
			"profile" => json!({"id": 99}),
			// Ignored without error once generation is skipped.
			"profile__bio" => "lost",
		})
		.unwrap();
	assert!(log.lock().unwrap().is_empty());
	// The supplied value is not an attribute of the primary object.
	assert_eq!(object.get("profile"), None);
}

#[rstest]
fn test_related_count_form() {
	let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();
	let badge = Factory::builder("badges.BadgeFactory")
		.model(RecordTarget::new("badges.Badge").with_save(move |obj| {
			sink.lock().unwrap().push(obj.to_value());
			Ok(())
		}))
		.set("n", Declaration::sequence(|n| n))
		.finish();
	let veteran = Factory::builder("users.VeteranFactory")
		.model(RecordTarget::new("users.User"))
		.set("username", "vet")
		.set("badges", Related::new(&badge, "holder").count(3))
		.finish();

	veteran.create().unwrap();
	let entries = seen.lock().unwrap();
	assert_eq!(entries.len(), 3);
	assert!(entries.iter().all(|e| e["holder"]["username"] == json!("vet")));
}

#[rstest]
fn test_related_factory_can_pin_its_strategy() {
	let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();
	let audit = Factory::builder("audit.EntryFactory")
		.model(RecordTarget::new("audit.Entry").with_save(move |obj| {
			sink.lock().unwrap().push(obj.to_value());
			Ok(())
		}))
		.finish();
	let user = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set(
			"audit",
			Related::new(&audit, "subject").strategy(Strategy::Create),
		)
		.finish();

	// The primary build does not persist, but the pinned related strategy
	// does.
	user.build().unwrap();
	assert_eq!(seen.lock().unwrap().len(), 1);
}

#[rstest]
fn test_method_call_with_single_positional_default() {
	let factory = Factory::builder("users.UserFactory")
		.model(
			RecordTarget::new("users.User").with_method("set_password", |obj, args, kwargs| {
				obj.set("password", args[0].clone());
				if let Some(rounds) = kwargs.get("rounds") {
					obj.set("rounds", rounds.clone());
				}
				Ok(())
			}),
		)
		.set(
			"password",
			MethodCall::new("set_password").arg("default-pass").kwarg("rounds", 10_i64),
		)
		.finish();

	let plain = factory.build().unwrap();
	assert_eq!(plain.get("password"), Some(&json!("default-pass")));
	assert_eq!(plain.get("rounds"), Some(&json!(10)));

	let overridden = factory
		.build_with(overrides! {
			"password" => "hunter2",
			"password__rounds" => 12_i64,
		})
		.unwrap();
	assert_eq!(overridden.get("password"), Some(&json!("hunter2")));
	assert_eq!(overridden.get("rounds"), Some(&json!(12)));
}

#[rstest]
fn test_method_call_with_multiple_defaults_requires_array_override() {
	let factory = Factory::builder("geo.PointFactory")
		.model(
			RecordTarget::new("geo.Point").with_method("move_to", |obj, args, _| {
				obj.set("x", args[0].clone());
				obj.set("y", args[1].clone());
				Ok(())
			}),
		)
		.set("position", MethodCall::new("move_to").arg(0_i64).arg(0_i64))
		.finish();

	let moved = factory
		.build_with(overrides! { "position" => json!([3, 4]) })
		.unwrap();
	assert_eq!(moved.get("x"), Some(&json!(3)));
	assert_eq!(moved.get("y"), Some(&json!(4)));

	let invalid = factory.build_with(overrides! { "position" => 3_i64 });
	assert!(matches!(
		invalid,
		Err(FactoryError::MethodOverride { .. })
	));
}

#[rstest]
fn test_method_call_on_unknown_method_propagates() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set("touch", MethodCall::new("touch"))
		.finish();
	assert!(matches!(
		factory.build(),
		Err(FactoryError::UnknownMethod { .. })
	));
}

#[rstest]
fn test_post_declarations_skipped_for_stubs() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set("username", "alice")
		.set(
			"marker",
			Declaration::post_hook(|obj, _| {
				obj.set("marked", true);
				Ok(())
			}),
		)
		.finish();

	let stub = factory.stub().unwrap();
	assert_eq!(stub.get("marked"), None);
	let built = factory.build().unwrap();
	assert_eq!(built.get("marked"), Some(&json!(true)));
}
