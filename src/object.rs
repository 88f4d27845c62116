//! Generated objects and the target collaborator contract.
//!
//! The engine never constructs user types directly. It resolves a
//! declaration set into [`Arguments`] and hands them to a [`Target`], whose
//! job is "given resolved kwargs, produce or persist an object". The
//! produced [`Object`] is a dynamic instance: a model identifier plus an
//! attribute map, convertible to typed structs through serde.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{FactoryError, FactoryResult};

/// The resolved argument set handed to a target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
	/// Positional arguments, extracted in `inline_args` order.
	pub args: Vec<Value>,

	/// Keyword arguments, after rename and exclusion.
	pub kwargs: Map<String, Value>,
}

impl Arguments {
	/// Creates an argument set from keyword arguments only.
	pub fn from_kwargs(kwargs: Map<String, Value>) -> Self {
		Self {
			args: Vec::new(),
			kwargs,
		}
	}
}

/// A generated instance: either a constructed model or a stub.
///
/// Objects are dynamic records. A sub-factory's product is carried into the
/// enclosing factory's arguments as its [`Value`] form (an attribute
/// snapshot), so there is no shared identity between an object and the
/// copies of it embedded in other objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
	model: Option<String>,
	attrs: Map<String, Value>,
	persisted: bool,
}

impl Object {
	/// Creates a constructed model instance.
	pub fn new(model: impl Into<String>, attrs: Map<String, Value>) -> Self {
		Self {
			model: Some(model.into()),
			attrs,
			persisted: false,
		}
	}

	/// Creates a stub: an attribute container with no model identity.
	pub fn stub(attrs: Map<String, Value>) -> Self {
		Self {
			model: None,
			attrs,
			persisted: false,
		}
	}

	/// Returns the model identifier, or `None` for stubs.
	pub fn model_id(&self) -> Option<&str> {
		self.model.as_deref()
	}

	/// Returns true if this object was produced by the stub strategy.
	pub fn is_stub(&self) -> bool {
		self.model.is_none()
	}

	/// Returns true if the persistence hook ran for this object.
	pub fn is_persisted(&self) -> bool {
		self.persisted
	}

	/// Marks the object as persisted.
	///
	/// Called by the default save hook; custom [`Target::save`]
	/// implementations should call this once their side effect succeeded.
	pub fn mark_persisted(&mut self) {
		self.persisted = true;
	}

	/// Returns an attribute value by name.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.attrs.get(name)
	}

	/// Sets an attribute value.
	pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
		self.attrs.insert(name.into(), value.into());
	}

	/// Returns the full attribute map.
	pub fn attrs(&self) -> &Map<String, Value> {
		&self.attrs
	}

	/// Returns the attribute map as a JSON value.
	pub fn to_value(&self) -> Value {
		Value::Object(self.attrs.clone())
	}

	/// Consumes the object, returning its attribute map as a JSON value.
	pub fn into_value(self) -> Value {
		Value::Object(self.attrs)
	}

	/// Decodes the object into a typed model via serde.
	///
	/// # Example
	///
	/// ```ignore
	/// #[derive(serde::Deserialize)]
	/// struct User {
	///     username: String,
	/// }
	///
	/// let user: User = factory.build()?.decode()?;
	/// ```
	pub fn decode<T: DeserializeOwned>(&self) -> FactoryResult<T> {
		Ok(serde_json::from_value(self.to_value())?)
	}
}

/// The collaborator contract between the engine and a target model.
///
/// The engine calls [`Target::instantiate`] for the build strategy and
/// [`Target::instantiate_and_persist`] for the create strategy. Errors
/// raised here propagate to the caller unchanged; the engine performs no
/// suppression or retry.
pub trait Target: Send + Sync {
	/// Returns the model identifier (e.g. "auth.User").
	fn model_id(&self) -> &str;

	/// Constructs an object from the resolved arguments.
	fn instantiate(&self, args: &Arguments) -> FactoryResult<Object>;

	/// Constructs an object, then persists it.
	///
	/// The default implementation constructs via [`Target::instantiate`]
	/// and then invokes [`Target::save`].
	fn instantiate_and_persist(&self, args: &Arguments) -> FactoryResult<Object> {
		let mut obj = self.instantiate(args)?;
		self.save(&mut obj)?;
		Ok(obj)
	}

	/// Save-like persistence hook invoked by the default
	/// [`Target::instantiate_and_persist`].
	///
	/// The default implementation only marks the object persisted.
	fn save(&self, obj: &mut Object) -> FactoryResult<()> {
		obj.mark_persisted();
		Ok(())
	}

	/// Invokes a named method on an instance.
	///
	/// Used by method-call declarations after the object exists. The
	/// default implementation knows no methods.
	fn call_method(
		&self,
		obj: &mut Object,
		method: &str,
		args: &[Value],
		kwargs: &Map<String, Value>,
	) -> FactoryResult<()> {
		let _ = (obj, args, kwargs);
		Err(FactoryError::UnknownMethod {
			model: self.model_id().to_string(),
			method: method.to_string(),
		})
	}
}

type MethodFn = dyn Fn(&mut Object, &[Value], &Map<String, Value>) -> FactoryResult<()> + Send + Sync;
type SaveFn = dyn Fn(&mut Object) -> FactoryResult<()> + Send + Sync;

/// A dynamic record target.
///
/// The constructed object's attributes are the resolved keyword arguments;
/// positional arguments are re-attached under their declared names.
/// Instance methods and a save hook can be registered as closures.
///
/// # Example
///
/// ```ignore
/// let target = RecordTarget::new("auth.User")
///     .with_method("set_password", |obj, args, _kwargs| {
///         obj.set("password", args[0].clone());
///         Ok(())
///     });
/// ```
pub struct RecordTarget {
	model_id: String,
	positional: Vec<String>,
	methods: HashMap<String, Arc<MethodFn>>,
	save_hook: Option<Arc<SaveFn>>,
}

impl RecordTarget {
	/// Creates a record target for the given model identifier.
	pub fn new(model_id: impl Into<String>) -> Self {
		Self {
			model_id: model_id.into(),
			positional: Vec::new(),
			methods: HashMap::new(),
			save_hook: None,
		}
	}

	/// Declares the names positional arguments are re-attached under, in
	/// order. Must match the factory's `inline_args`.
	pub fn with_positional<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.positional = names.into_iter().map(Into::into).collect();
		self
	}

	/// Registers an instance method callable by method-call declarations.
	pub fn with_method<F>(mut self, name: impl Into<String>, f: F) -> Self
	where
		F: Fn(&mut Object, &[Value], &Map<String, Value>) -> FactoryResult<()>
			+ Send
			+ Sync
			+ 'static,
	{
		self.methods.insert(name.into(), Arc::new(f));
		self
	}

	/// Registers a custom save hook run by the create strategy.
	///
	/// The object is marked persisted after the hook succeeds.
	pub fn with_save<F>(mut self, f: F) -> Self
	where
		F: Fn(&mut Object) -> FactoryResult<()> + Send + Sync + 'static,
	{
		self.save_hook = Some(Arc::new(f));
		self
	}
}

impl Target for RecordTarget {
	fn model_id(&self) -> &str {
		&self.model_id
	}

	fn instantiate(&self, args: &Arguments) -> FactoryResult<Object> {
		if args.args.len() > self.positional.len() {
			return Err(FactoryError::Instantiation {
				model: self.model_id.clone(),
				message: format!(
					"{} positional arguments given, but only {} declared",
					args.args.len(),
					self.positional.len()
				),
			});
		}
		let mut attrs = args.kwargs.clone();
		for (name, value) in self.positional.iter().zip(args.args.iter()) {
			attrs.insert(name.clone(), value.clone());
		}
		Ok(Object::new(self.model_id.clone(), attrs))
	}

	fn save(&self, obj: &mut Object) -> FactoryResult<()> {
		if let Some(hook) = &self.save_hook {
			hook(obj)?;
		}
		obj.mark_persisted();
		Ok(())
	}

	fn call_method(
		&self,
		obj: &mut Object,
		method: &str,
		args: &[Value],
		kwargs: &Map<String, Value>,
	) -> FactoryResult<()> {
		match self.methods.get(method) {
			Some(f) => f(obj, args, kwargs),
			None => Err(FactoryError::UnknownMethod {
				model: self.model_id.clone(),
				method: method.to_string(),
			}),
		}
	}
}

/// A typed target backed by serde.
///
/// The resolved keyword arguments are deserialized into `T`, validating the
/// attribute shape against the real struct at build time, then carried as a
/// dynamic [`Object`]. Positional arguments are not supported; declare
/// keyword attributes instead.
pub struct SerdeTarget<T> {
	model_id: String,
	_marker: PhantomData<fn() -> T>,
}

impl<T> SerdeTarget<T> {
	/// Creates a serde target for the given model identifier.
	pub fn new(model_id: impl Into<String>) -> Self {
		Self {
			model_id: model_id.into(),
			_marker: PhantomData,
		}
	}
}

impl<T> Target for SerdeTarget<T>
where
	T: Serialize + DeserializeOwned,
{
	fn model_id(&self) -> &str {
		&self.model_id
	}

	fn instantiate(&self, args: &Arguments) -> FactoryResult<Object> {
		if !args.args.is_empty() {
			return Err(FactoryError::Instantiation {
				model: self.model_id.clone(),
				message: "positional arguments are not supported by serde targets".to_string(),
			});
		}
		let typed: T = serde_json::from_value(Value::Object(args.kwargs.clone()))
			.map_err(|err| FactoryError::Instantiation {
				model: self.model_id.clone(),
				message: err.to_string(),
			})?;
		match serde_json::to_value(&typed)? {
			Value::Object(attrs) => Ok(Object::new(self.model_id.clone(), attrs)),
			other => Err(FactoryError::Instantiation {
				model: self.model_id.clone(),
				message: format!("model serialized to non-object value: {other}"),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde::Deserialize;
	use serde_json::json;

	fn kwargs(pairs: &[(&str, Value)]) -> Map<String, Value> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.clone()))
			.collect()
	}

	#[rstest]
	fn test_record_target_instantiate() {
		let target = RecordTarget::new("auth.User").with_positional(["username"]);
		let args = Arguments {
			args: vec![json!("alice")],
			kwargs: kwargs(&[("email", json!("alice@example.com"))]),
		};
		let obj = target.instantiate(&args).unwrap();
		assert_eq!(obj.model_id(), Some("auth.User"));
		assert_eq!(obj.get("username"), Some(&json!("alice")));
		assert_eq!(obj.get("email"), Some(&json!("alice@example.com")));
		assert!(!obj.is_persisted());
	}

	#[rstest]
	fn test_record_target_rejects_extra_positional() {
		let target = RecordTarget::new("auth.User");
		let args = Arguments {
			args: vec![json!("alice")],
			kwargs: Map::new(),
		};
		let result = target.instantiate(&args);
		assert!(matches!(result, Err(FactoryError::Instantiation { .. })));
	}

	#[rstest]
	fn test_record_target_persist_marks_object() {
		let target = RecordTarget::new("auth.User");
		let args = Arguments::from_kwargs(kwargs(&[("username", json!("bob"))]));
		let obj = target.instantiate_and_persist(&args).unwrap();
		assert!(obj.is_persisted());
	}

	#[rstest]
	fn test_record_target_method_call() {
		let target = RecordTarget::new("auth.User").with_method(
			"set_password",
			|obj, args, _kwargs| {
				obj.set("password", args[0].clone());
				Ok(())
			},
		);
		let mut obj = Object::new("auth.User", Map::new());
		target
			.call_method(&mut obj, "set_password", &[json!("s3cret")], &Map::new())
			.unwrap();
		assert_eq!(obj.get("password"), Some(&json!("s3cret")));

		let missing = target.call_method(&mut obj, "missing", &[], &Map::new());
		assert!(matches!(missing, Err(FactoryError::UnknownMethod { .. })));
	}

	#[derive(Debug, Serialize, Deserialize, PartialEq)]
	struct User {
		username: String,
		active: bool,
	}

	#[rstest]
	fn test_serde_target_validates_shape() {
		let target = SerdeTarget::<User>::new("auth.User");
		let ok = target.instantiate(&Arguments::from_kwargs(kwargs(&[
			("username", json!("carol")),
			("active", json!(true)),
		])));
		assert!(ok.is_ok());

		let missing_field =
			target.instantiate(&Arguments::from_kwargs(kwargs(&[("active", json!(true))])));
		assert!(matches!(
			missing_field,
			Err(FactoryError::Instantiation { .. })
		));
	}

	#[rstest]
	fn test_object_decode() {
		let obj = Object::new(
			"auth.User",
			kwargs(&[("username", json!("dave")), ("active", json!(false))]),
		);
		let user: User = obj.decode().unwrap();
		assert_eq!(
			user,
			User {
				username: "dave".to_string(),
				active: false,
			}
		);
	}

	#[rstest]
	fn test_stub_object() {
		let obj = Object::stub(kwargs(&[("name", json!("stub"))]));
		assert!(obj.is_stub());
		assert_eq!(obj.model_id(), None);
	}
}
