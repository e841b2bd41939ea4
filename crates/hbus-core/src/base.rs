//! Capability traits and the origin-tracked propagation protocol.
//!
//! A connectable object implements whichever of [`Readable`], [`Writable`],
//! [`Subscribable`] and [`Reading`] apply to it; [`connect`] wires two such
//! objects together by matching complementary capabilities, the way the
//! original implementation's `connect()` inspected `isinstance` pairs at
//! call time. Cycle avoidance does not need graph coloring: every `write`
//! carries an [`Origin`], a list of the object identities it has already
//! passed through, and a publish step only delivers to subscribers not
//! already in that list.

use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::ids::ObjectId;
use crate::value::{Value, ValueKind};

/// A value-conversion closure looked up from the conversion registry at
/// `connect()` time. Applied once per delivered value, never re-resolved.
pub type Converter = Arc<dyn Fn(&Value) -> CoreResult<Value> + Send + Sync>;

/// The chain of object identities a value has already passed through.
///
/// Immutable and cheap to extend: each hop clones the list and appends its
/// own identity rather than mutating a list shared with other in-flight
/// deliveries, so concurrent fan-out from one publish never races.
#[derive(Debug, Clone, Default)]
pub struct Origin(Vec<ObjectId>);

impl Origin {
    /// The empty origin, used for writes/publishes that originate outside
    /// the propagation network (an interface's initial reading, a web API
    /// POST, a script).
    pub fn root() -> Self {
        Origin(Vec::new())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A fresh list with `id` appended; `self` is left untouched.
    #[must_use]
    pub fn extended(&self, id: ObjectId) -> Origin {
        let mut next = self.0.clone();
        next.push(id);
        Origin(next)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, "]")
    }
}

/// An object whose current value can be read on demand.
#[async_trait]
pub trait Readable: Send + Sync {
    fn id(&self) -> ObjectId;
    fn kind(&self) -> ValueKind;
    async fn read(&self) -> CoreResult<Value>;
}

/// An object that accepts externally-originated writes.
#[async_trait]
pub trait Writable: Send + Sync {
    fn id(&self) -> ObjectId;
    fn kind(&self) -> ValueKind;
    async fn write(&self, value: Value, origin: Origin) -> CoreResult<()>;
}

/// An object that notifies subscribers whenever its value changes.
#[async_trait]
pub trait Subscribable: Send + Sync {
    fn id(&self) -> ObjectId;
    fn kind(&self) -> ValueKind;

    /// Register `target` to receive future published values, optionally
    /// through `converter` when the two sides' kinds differ. Synchronous:
    /// subscriber lists are only ever mutated at wiring time, never from
    /// inside a publish.
    fn subscribe(&self, target: Arc<dyn Writable>, converter: Option<Converter>);

    /// Deliver `value` to every subscriber not already present in `origin`.
    /// Extends `origin` with this object's own identity exactly once before
    /// fanning out, so every recipient sees the same extended list.
    async fn publish(&self, value: Value, origin: Origin) -> CoreResult<()>;
}

/// An object that pulls its value from an upstream [`Readable`] provider,
/// e.g. at interface startup (`shc.supervisor`'s variable initialization
/// pass reads every `Reading` variable's provider before starting timers).
#[async_trait]
pub trait Reading: Send + Sync {
    fn id(&self) -> ObjectId;
    fn kind(&self) -> ValueKind;

    /// Register the upstream provider this object reads its initial/default
    /// value from. `optional` marks whether a failed read is tolerated
    /// (logged and skipped) or fatal during startup.
    fn set_provider(&self, provider: Arc<dyn Readable>, converter: Option<Converter>, optional: bool);

    fn is_optional(&self) -> bool;

    /// Pull the current value through the registered provider, applying
    /// its converter. Returns [`CoreError::Configuration`] if no provider
    /// was ever set.
    async fn from_provider(&self) -> CoreResult<Value>;
}

struct Edge {
    target: Arc<dyn Writable>,
    converter: Option<Converter>,
}

/// Shared subscriber bookkeeping for any [`Subscribable`] implementation.
///
/// `subscribe` takes a plain `RwLock` write lock and returns immediately;
/// `publish` takes a brief read lock to snapshot the matching edges, then
/// drops it before awaiting delivery, so no lock is ever held across an
/// `.await`.
#[derive(Default)]
pub struct SubscriberList {
    edges: RwLock<Vec<Edge>>,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, target: Arc<dyn Writable>, converter: Option<Converter>) {
        self.edges
            .write()
            .expect("subscriber list poisoned")
            .push(Edge { target, converter });
    }

    /// Extend `origin` with `self_id`, then deliver `value` to every
    /// subscriber not already present in the extended list.
    pub async fn publish(&self, self_id: ObjectId, value: Value, origin: &Origin) -> CoreResult<()> {
        let extended = origin.extended(self_id);

        let edges: Vec<(Arc<dyn Writable>, Option<Converter>)> = {
            let guard = self.edges.read().expect("subscriber list poisoned");
            guard
                .iter()
                .filter(|edge| !extended.contains(edge.target.id()))
                .map(|edge| (edge.target.clone(), edge.converter.clone()))
                .collect()
        };

        if edges.is_empty() {
            return Ok(());
        }

        let deliveries = edges.into_iter().map(|(target, converter)| {
            let value = value.clone();
            let extended = extended.clone();
            async move {
                let converted = match &converter {
                    Some(c) => c(&value)?,
                    None => value,
                };
                target.write(converted, extended).await
            }
        });

        let results = futures_util::future::join_all(deliveries).await;
        let mut first_err = None;
        for result in results {
            if let Err(err) = result {
                tracing::warn!(error = %err, "subscriber write failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// The capability surface of a connectable object, as needed to decide
/// which side of `connect()` supplies which half of an edge.
///
/// Rust has no runtime `isinstance`, so rather than downcasting trait
/// objects, each connectable exposes an `Endpoint` naming whichever
/// capabilities it actually implements; unsupported ones are `None`.
pub struct Endpoint {
    pub kind: ValueKind,
    pub readable: Option<Arc<dyn Readable>>,
    pub writable: Option<Arc<dyn Writable>>,
    pub subscribable: Option<Arc<dyn Subscribable>>,
    pub reading: Option<Arc<dyn Reading>>,
}

impl Endpoint {
    pub fn new(kind: ValueKind) -> Self {
        Endpoint {
            kind,
            readable: None,
            writable: None,
            subscribable: None,
            reading: None,
        }
    }
}

/// Looks up a converter between two kinds, if they differ.
pub trait ConverterLookup {
    fn lookup(&self, from: ValueKind, to: ValueKind) -> Option<Converter>;
}

/// Wire two connectable objects together, matching whichever capabilities
/// each side supports. At least one of `a -> b` (subscribable/reading into
/// writable/readable) or `b -> a` must apply, or neither side exposes
/// anything useful to the other and the call is a configuration error.
///
/// Mirrors the original's `connect()`: it is symmetric in its arguments but
/// may set up edges in both directions (e.g. a two-way UI widget connects
/// as both `Subscribable -> Writable` and `Reading -> Readable`).
pub fn connect(a: &Endpoint, b: &Endpoint, converters: &dyn ConverterLookup) -> CoreResult<()> {
    let mut wired = false;

    if let (Some(sub), Some(w)) = (&a.subscribable, &b.writable) {
        wire_subscription(sub.as_ref(), w.clone(), a.kind, b.kind, converters)?;
        wired = true;
    }
    if let (Some(sub), Some(w)) = (&b.subscribable, &a.writable) {
        wire_subscription(sub.as_ref(), w.clone(), b.kind, a.kind, converters)?;
        wired = true;
    }
    if let (Some(reading), Some(readable)) = (&a.reading, &b.readable) {
        wire_provider(reading.as_ref(), readable.clone(), b.kind, a.kind, converters)?;
        wired = true;
    }
    if let (Some(reading), Some(readable)) = (&b.reading, &a.readable) {
        wire_provider(reading.as_ref(), readable.clone(), a.kind, b.kind, converters)?;
        wired = true;
    }

    if wired {
        Ok(())
    } else {
        Err(CoreError::Configuration(
            "neither side exposes a subscribable/writable or reading/readable pair".into(),
        ))
    }
}

fn resolve_converter(
    from: ValueKind,
    to: ValueKind,
    converters: &dyn ConverterLookup,
) -> CoreResult<Option<Converter>> {
    if from == to {
        return Ok(None);
    }
    converters
        .lookup(from, to)
        .map(Some)
        .ok_or(CoreError::NoConverter { from, to })
}

fn wire_subscription(
    source: &dyn Subscribable,
    target: Arc<dyn Writable>,
    source_kind: ValueKind,
    target_kind: ValueKind,
    converters: &dyn ConverterLookup,
) -> CoreResult<()> {
    let converter = resolve_converter(source_kind, target_kind, converters)?;
    source.subscribe(target, converter);
    Ok(())
}

fn wire_provider(
    sink: &dyn Reading,
    provider: Arc<dyn Readable>,
    provider_kind: ValueKind,
    sink_kind: ValueKind,
    converters: &dyn ConverterLookup,
) -> CoreResult<()> {
    let converter = resolve_converter(provider_kind, sink_kind, converters)?;
    let optional = sink.is_optional();
    sink.set_provider(provider, converter, optional);
    Ok(())
}
