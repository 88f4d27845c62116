//! End-to-end factory scenarios: declaration resolution, nesting,
//! precedence and strategy dispatch.

use std::sync::{Arc, Mutex};

use fabrica::overrides;
use fabrica::prelude::*;
use rstest::rstest;
use serde::{Deserialize, Serialize};
use serde_json::json;

fn user_factory() -> Factory {
	Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set("first_name", "Jack")
		.set("username", Declaration::sequence(|n| format!("user{n}")))
		.set(
			"email",
			Declaration::lazy_attr(|r| Ok(format!("{}@example.com", r.string("username")?).into())),
		)
		.finish()
}

#[rstest]
fn test_sequence_attribute_over_consecutive_calls() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set("phone", Declaration::sequence(|n| format!("123-555-{n:04}")))
		.finish();

	let first = factory.build().unwrap();
	let second = factory.build().unwrap();
	assert_eq!(first.get("phone"), Some(&json!("123-555-0000")));
	assert_eq!(second.get("phone"), Some(&json!("123-555-0001")));
}

#[rstest]
fn test_lazy_attribute_reads_sibling() {
	let factory = user_factory();
	let user = factory.build().unwrap();
	assert_eq!(user.get("username"), Some(&json!("user0")));
	assert_eq!(user.get("email"), Some(&json!("user0@example.com")));
}

#[rstest]
fn test_call_time_override_wins_over_declaration() {
	let factory = user_factory();
	let user = factory
		.build_with(overrides! { "username" => "admin" })
		.unwrap();
	assert_eq!(user.get("username"), Some(&json!("admin")));
	assert_eq!(user.get("email"), Some(&json!("admin@example.com")));
}

#[rstest]
fn test_subfactory_default_and_outer_override() {
	let user = user_factory();
	let company = Factory::builder("companies.CompanyFactory")
		.model(RecordTarget::new("companies.Company"))
		.set("name", "Initech")
		.set("owner", SubFactory::new(&user).set("first_name", "Jack"))
		.finish();

	let plain = company.build().unwrap();
	assert_eq!(plain.get("owner").unwrap()["first_name"], json!("Jack"));

	let overridden = company
		.build_with(overrides! { "owner__first_name" => "Henry" })
		.unwrap();
	assert_eq!(
		overridden.get("owner").unwrap()["first_name"],
		json!("Henry")
	);
	// The routed override lands in the nested object, not on the outer one.
	assert_eq!(overridden.get("owner__first_name"), None);
	assert_eq!(overridden.get("first_name"), None);
}

#[rstest]
fn test_subfactory_replaced_wholesale_by_value() {
	let user = user_factory();
	let company = Factory::builder("companies.CompanyFactory")
		.model(RecordTarget::new("companies.Company"))
		.set("owner", SubFactory::new(&user))
		.finish();

	let object = company
		.build_with(overrides! { "owner" => json!({"username": "given"}) })
		.unwrap();
	assert_eq!(object.get("owner"), Some(&json!({"username": "given"})));
}

#[rstest]
fn test_precedence_call_time_over_trait_over_declared() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.param("admin", false)
		.set("role", "member")
		.with_trait("admin", Trait::new().set("role", "superuser"))
		.finish();

	let declared = factory.build().unwrap();
	assert_eq!(declared.get("role"), Some(&json!("member")));

	let via_trait = factory.build_with(overrides! { "admin" => true }).unwrap();
	assert_eq!(via_trait.get("role"), Some(&json!("superuser")));

	let call_time = factory
		.build_with(overrides! { "admin" => true, "role" => "auditor" })
		.unwrap();
	assert_eq!(call_time.get("role"), Some(&json!("auditor")));
}

#[rstest]
fn test_trait_gate_declared_default_activates() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.param("admin", true)
		.set("is_staff", false)
		.with_trait("admin", Trait::new().set("is_staff", true))
		.finish();

	let object = factory.build().unwrap();
	assert_eq!(object.get("is_staff"), Some(&json!(true)));
	// The gate is a param and never reaches the target.
	assert_eq!(object.get("admin"), None);
}

#[rstest]
fn test_trait_with_routed_override_into_subfactory() {
	let user = user_factory();
	let company = Factory::builder("companies.CompanyFactory")
		.model(RecordTarget::new("companies.Company"))
		.param("founder_led", false)
		.set("owner", SubFactory::new(&user))
		.with_trait(
			"founder_led",
			Trait::new().set("owner__first_name", "Founder"),
		)
		.finish();

	let object = company
		.build_with(overrides! { "founder_led" => true })
		.unwrap();
	assert_eq!(object.get("owner").unwrap()["first_name"], json!("Founder"));
}

#[rstest]
fn test_create_propagates_through_subfactory() {
	let saved: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

	let user_log = saved.clone();
	let user = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User").with_save(move |obj| {
			user_log
				.lock()
				.unwrap()
				.push(obj.model_id().unwrap_or_default().to_string());
			Ok(())
		}))
		.set("username", "worker")
		.finish();

	let company_log = saved.clone();
	let company = Factory::builder("companies.CompanyFactory")
		.model(RecordTarget::new("companies.Company").with_save(move |obj| {
			company_log
				.lock()
				.unwrap()
				.push(obj.model_id().unwrap_or_default().to_string());
			Ok(())
		}))
		.set("owner", SubFactory::new(&user))
		.finish();

	let object = company.create().unwrap();
	assert!(object.is_persisted());
	// The nested object persists first, with the same strategy.
	assert_eq!(
		*saved.lock().unwrap(),
		vec!["users.User".to_string(), "companies.Company".to_string()]
	);

	saved.lock().unwrap().clear();
	company.build().unwrap();
	assert!(saved.lock().unwrap().is_empty());
}

#[rstest]
fn test_stub_strategy_needs_no_model() {
	let factory = Factory::builder("ghosts.GhostFactory")
		.set("name", Declaration::sequence(|n| format!("ghost{n}")))
		.finish();

	let stub = factory.stub().unwrap();
	assert!(stub.is_stub());
	assert_eq!(stub.get("name"), Some(&json!("ghost0")));
	assert!(matches!(factory.build(), Err(FactoryError::MissingModel(_))));
}

#[rstest]
fn test_stub_propagates_into_subfactory() {
	let inner = Factory::builder("inner.Factory")
		.set("kind", "nested")
		.finish();
	let outer = Factory::builder("outer.Factory")
		.set("child", SubFactory::new(&inner))
		.finish();

	let stub = outer.stub().unwrap();
	assert_eq!(stub.get("child").unwrap()["kind"], json!("nested"));
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Account {
	username: String,
	email: String,
	active: bool,
}

#[rstest]
fn test_serde_target_round_trip() {
	let factory = Factory::builder("accounts.AccountFactory")
		.model(SerdeTarget::<Account>::new("accounts.Account"))
		.set("username", Declaration::sequence(|n| format!("acct{n}")))
		.set(
			"email",
			Declaration::lazy_attr(|r| Ok(format!("{}@example.com", r.string("username")?).into())),
		)
		.set("active", true)
		.finish();

	let account: Account = factory.build().unwrap().decode().unwrap();
	assert_eq!(
		account,
		Account {
			username: "acct0".to_string(),
			email: "acct0@example.com".to_string(),
			active: true,
		}
	);
}

#[rstest]
fn test_serde_target_rejects_wrong_shape() {
	let factory = Factory::builder("accounts.AccountFactory")
		.model(SerdeTarget::<Account>::new("accounts.Account"))
		.set("username", "only")
		.finish();
	assert!(matches!(
		factory.build(),
		Err(FactoryError::Instantiation { .. })
	));
}

#[rstest]
fn test_generate_batch_repeats_algorithm() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.set("username", Declaration::sequence(|n| format!("user{n}")))
		.finish();

	let users = factory.build_batch(3).unwrap();
	let names: Vec<&serde_json::Value> =
		users.iter().filter_map(|u| u.get("username")).collect();
	assert_eq!(names, vec!["user0", "user1", "user2"]);
}

#[rstest]
fn test_unknown_kwargs_pass_through() {
	let factory = user_factory();
	let user = factory
		.build_with(overrides! { "nickname" => "J", "extra__deep" => 1 })
		.unwrap();
	assert_eq!(user.get("nickname"), Some(&json!("J")));
	// A dotted name with no matching declaration stays literal.
	assert_eq!(user.get("extra__deep"), Some(&json!(1)));
}

#[rstest]
fn test_default_strategy_drives_step_builder() {
	let factory = Factory::builder("users.UserFactory")
		.model(RecordTarget::new("users.User"))
		.default_strategy(Strategy::Create)
		.set("username", "saved")
		.finish();

	let object = StepBuilder::new(&factory).generate().unwrap();
	assert!(object.is_persisted());
}
