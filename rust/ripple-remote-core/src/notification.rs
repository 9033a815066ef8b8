//! Push-notification registry.
//!
//! Maps the `type` discriminator of an unsolicited message to the decoder
//! that builds the typed notification. Built once before connecting; the
//! dispatch loop only looks decoders up.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

type Decoder<N> = Box<dyn Fn(&[u8]) -> Result<N, serde_json::Error> + Send + Sync>;

pub struct NotificationRegistry<N> {
    decoders: HashMap<&'static str, Decoder<N>>,
}

impl<N> std::fmt::Debug for NotificationRegistry<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.decoders.keys().collect();
        kinds.sort_unstable();
        f.debug_struct("NotificationRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl<N: 'static> Default for NotificationRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: 'static> NotificationRegistry<N> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Decode messages of type `kind` as `T`, then wrap them into `N`.
    ///
    /// Registering the same `kind` twice keeps the last decoder.
    pub fn register<T, F>(mut self, kind: &'static str, wrap: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> N + Send + Sync + 'static,
    {
        let decoder: Decoder<N> =
            Box::new(move |bytes| serde_json::from_slice::<T>(bytes).map(&wrap));
        self.decoders.insert(kind, decoder);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.decoders.contains_key(kind)
    }

    /// Decode `bytes` as a notification of type `kind`.
    ///
    /// Returns `None` when `kind` is not a registered push type.
    pub fn decode(&self, kind: &str, bytes: &[u8]) -> Option<Result<N, serde_json::Error>> {
        self.decoders.get(kind).map(|decode| decode(bytes))
    }
}
