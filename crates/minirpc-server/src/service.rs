//! Named services and their callable methods.
//!
//! There is no runtime reflection here: a service is built explicitly by
//! registering typed async handlers. The typed signature
//! `async fn(Args) -> Result<Reply, RpcError>` is erased at registration
//! time into a boxed dispatcher that decodes the argument bytes with the
//! session codec, runs the handler, and encodes the reply.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use minirpc_core::{Codec, Result, RpcError};

/// Future returned by an erased method handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send>>;

type BoxedHandler = Box<dyn Fn(Codec, Vec<u8>) -> HandlerFuture + Send + Sync>;

/// One registered method: the erased handler plus its invocation counter.
struct Method {
    handler: BoxedHandler,
    calls: AtomicU64,
}

/// A named grouping of remotely callable methods.
///
/// Service and method names must be "exported": non-empty, starting with an
/// ASCII uppercase letter, and free of `.` (the service/method separator).
///
/// # Example
///
/// ```
/// use minirpc_server::Service;
/// use minirpc_core::RpcError;
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Args { a: i32, b: i32 }
///
/// let service = Service::new("Arith")
///     .method("Sum", |args: Args| async move { Ok::<_, RpcError>(args.a + args.b) });
/// assert_eq!(service.method_names(), vec!["Sum".to_string()]);
/// ```
pub struct Service {
    name: String,
    methods: HashMap<String, Method>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Service {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a typed async handler under `name`.
    ///
    /// Handlers take one argument value and return one reply value, the only
    /// method shape the framework exposes. Names that are not exported are
    /// skipped with a warning; registering an existing name replaces it.
    pub fn method<A, R, F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        if !is_exported(name) {
            warn!(service = %self.name, method = %name, "skipping method with unexported name");
            return self;
        }

        let handler = Arc::new(handler);
        let erased: BoxedHandler = Box::new(move |codec: Codec, body: Vec<u8>| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let args: A = codec.decode(&body)?;
                let reply = handler(args).await?;
                codec.encode(&reply)
            })
        });

        info!(service = %self.name, method = %name, "registered method");
        self.methods.insert(
            name.to_string(),
            Method {
                handler: erased,
                calls: AtomicU64::new(0),
            },
        );
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// How many times `name` has been invoked, `None` for unknown methods.
    pub fn num_calls(&self, name: &str) -> Option<u64> {
        self.methods.get(name).map(|m| m.calls.load(Ordering::Relaxed))
    }

    /// Starts an invocation of `name` with the given encoded argument.
    pub(crate) fn dispatch(&self, name: &str, codec: Codec, body: Vec<u8>) -> Result<HandlerFuture> {
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| RpcError::Dispatch(format!("rpc: can't find method {name}")))?;
        method.calls.fetch_add(1, Ordering::Relaxed);
        Ok((method.handler)(codec, body))
    }
}

/// An exported name starts with an ASCII uppercase letter and contains no `.`.
pub(crate) fn is_exported(name: &str) -> bool {
    !name.contains('.')
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase())
}
