//! `Variable`: the reference connectable object combining storage,
//! dedup-on-write, and fan-out to subscribers.
//!
//! Grounded on the original `shc.base.Variable`: a write that carries the
//! same value (by equality) as the current one is swallowed rather than
//! republished, so idempotent upstream writes don't cause subscriber
//! storms. A fresh value updates storage first, then publishes, so any
//! subscriber that reads back through a different path during its own
//! `write` sees the new value already in place.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::base::{Origin, Readable, Reading, Subscribable, SubscriberList, Writable};
use crate::error::{CoreError, CoreResult};
use crate::ids::ObjectId;
use crate::value::{Value, ValueKind};

/// An in-process variable: readable, writable, subscribable, and able to
/// pull its initial value from an upstream provider.
pub struct Variable {
    id: ObjectId,
    kind: ValueKind,
    name: String,
    state: RwLock<Option<Value>>,
    subscribers: SubscriberList,
    provider: std::sync::RwLock<Option<ProviderBinding>>,
}

struct ProviderBinding {
    provider: Arc<dyn Readable>,
    converter: Option<crate::base::Converter>,
    optional: bool,
}

impl Variable {
    pub fn new(kind: ValueKind, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Variable {
            id: ObjectId::new(),
            kind,
            name: name.into(),
            state: RwLock::new(None),
            subscribers: SubscriberList::new(),
            provider: std::sync::RwLock::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value without propagation side effects, or `None` if never
    /// written and never initialized from a provider.
    pub async fn current(&self) -> Option<Value> {
        self.state.read().await.clone()
    }

    fn check_kind(&self, value: &Value) -> CoreResult<()> {
        if value.kind() == self.kind {
            Ok(())
        } else {
            Err(CoreError::TypeMismatch {
                expected: self.kind,
                actual: value.kind(),
            })
        }
    }

    /// Update storage and publish if, and only if, `value` differs from the
    /// stored one. Returns `true` when a publish happened.
    async fn set_and_maybe_publish(&self, value: Value, origin: Origin) -> CoreResult<bool> {
        self.check_kind(&value)?;
        {
            let mut guard = self.state.write().await;
            if guard.as_ref() == Some(&value) {
                return Ok(false);
            }
            *guard = Some(value.clone());
        }
        self.subscribers.publish(self.id, value, &origin).await?;
        Ok(true)
    }
}

#[async_trait]
impl Readable for Variable {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    async fn read(&self) -> CoreResult<Value> {
        self.state.read().await.clone().ok_or(CoreError::Uninitialized)
    }
}

#[async_trait]
impl Writable for Variable {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    async fn write(&self, value: Value, origin: Origin) -> CoreResult<()> {
        self.set_and_maybe_publish(value, origin).await?;
        Ok(())
    }
}

#[async_trait]
impl Subscribable for Variable {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    fn subscribe(&self, target: Arc<dyn Writable>, converter: Option<crate::base::Converter>) {
        self.subscribers.add(target, converter);
    }
    async fn publish(&self, value: Value, origin: Origin) -> CoreResult<()> {
        self.set_and_maybe_publish(value, origin).await?;
        Ok(())
    }
}

#[async_trait]
impl Reading for Variable {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    fn set_provider(&self, provider: Arc<dyn Readable>, converter: Option<crate::base::Converter>, optional: bool) {
        *self.provider.write().expect("provider lock poisoned") = Some(ProviderBinding {
            provider,
            converter,
            optional,
        });
    }
    fn is_optional(&self) -> bool {
        self.provider
            .read()
            .expect("provider lock poisoned")
            .as_ref()
            .is_some_and(|b| b.optional)
    }
    async fn from_provider(&self) -> CoreResult<Value> {
        let binding = {
            let guard = self.provider.read().expect("provider lock poisoned");
            match guard.as_ref() {
                Some(b) => (b.provider.clone(), b.converter.clone()),
                None => {
                    return Err(CoreError::Configuration(format!(
                        "variable {} has no provider bound",
                        self.name
                    )));
                }
            }
        };
        let (provider, converter) = binding;
        let raw = provider.read().await?;
        match converter {
            Some(c) => c(&raw),
            None => Ok(raw),
        }
    }
}

/// Pull this variable's value from its provider and write it in, using the
/// root origin. Used by the process supervisor's variable-initialization
/// pass before any interface or timer is started.
pub async fn initialize_from_provider(var: &Variable) -> CoreResult<()> {
    let value = var.from_provider().await?;
    var.set_and_maybe_publish(value, Origin::root()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_write_is_not_republished() {
        let var = Variable::new(ValueKind::Int, "v");
        let target = Variable::new(ValueKind::Int, "t");
        var.subscribe(target.clone(), None);

        var.write(Value::Int(5), Origin::root()).await.unwrap();
        assert_eq!(target.current().await, Some(Value::Int(5)));

        // Overwrite the target out of band so we can tell whether the
        // second identical write to `var` republishes.
        target.write(Value::Int(0), Origin::root()).await.unwrap();
        var.write(Value::Int(5), Origin::root()).await.unwrap();
        assert_eq!(target.current().await, Some(Value::Int(0)));
    }

    #[tokio::test]
    async fn write_of_wrong_kind_is_rejected() {
        let var = Variable::new(ValueKind::Int, "v");
        let err = var.write(Value::Str("x".into()), Origin::root()).await.unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn read_before_any_write_is_uninitialized() {
        let var = Variable::new(ValueKind::Int, "v");
        assert!(matches!(var.read().await, Err(CoreError::Uninitialized)));
    }

    struct ConstProvider {
        id: ObjectId,
        value: Value,
    }
    #[async_trait]
    impl Readable for ConstProvider {
        fn id(&self) -> ObjectId {
            self.id
        }
        fn kind(&self) -> ValueKind {
            self.value.kind()
        }
        async fn read(&self) -> CoreResult<Value> {
            Ok(self.value.clone())
        }
    }

    #[tokio::test]
    async fn initialize_from_provider_pulls_and_publishes() {
        let var = Variable::new(ValueKind::Int, "v");
        let provider = Arc::new(ConstProvider {
            id: ObjectId::new(),
            value: Value::Int(42),
        });
        var.set_provider(provider, None, false);
        initialize_from_provider(&var).await.unwrap();
        assert_eq!(var.current().await, Some(Value::Int(42)));
    }
}
