//! The encoding boundary.
//!
//! A [`Codec`] turns bytes of one format into [`Records`] and back. The
//! engine never parses bytes itself; backends register codecs and the
//! converters they contribute call them.

use crate::error::{CodecError, EngineError};
use ferry_resource::{FormatId, Records};
use hashbrown::HashMap;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Free-form codec parameters, e.g. `delimiter=;`.
pub type Params = BTreeMap<String, String>;

/// Byte-level encoding of one format.
pub trait Codec: Send + Sync + 'static {
    /// The format this codec implements.
    fn format(&self) -> FormatId;

    /// File extensions mapping to this format, without the dot. The first is
    /// used when naming new files.
    fn extensions(&self) -> &[&'static str];

    /// Decodes a whole file.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] for invalid input or parameters.
    fn decode(&self, bytes: &[u8], params: &Params) -> Result<Records, CodecError>;

    /// Encodes a whole table.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] for unrepresentable values or invalid parameters.
    fn encode(&self, records: &Records, params: &Params) -> Result<Vec<u8>, CodecError>;
}

/// Known codecs, by format and by extension.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: IndexMap<FormatId, Arc<dyn Codec>>,
    extensions: HashMap<String, FormatId>,
}

impl core::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("formats", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CodecRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a codec, replacing any codec for the same format.
    pub fn register(&mut self, codec: impl Codec) {
        let codec: Arc<dyn Codec> = Arc::new(codec);
        let format = codec.format();
        for ext in codec.extensions() {
            self.extensions.insert(ext.to_ascii_lowercase(), format);
        }
        if self.codecs.insert(format, codec).is_some() {
            tracing::debug!(%format, "codec replaced");
        }
    }

    /// Resolves a type hint, which may be a format name or an extension.
    #[must_use]
    pub fn lookup(&self, hint: &str) -> Option<FormatId> {
        let hint = hint.trim().trim_start_matches('.').to_ascii_lowercase();
        self.codecs
            .keys()
            .find(|format| format.name() == hint)
            .copied()
            .or_else(|| self.extensions.get(&hint).copied())
    }

    /// Returns the codec for `format`.
    #[must_use]
    pub fn get(&self, format: FormatId) -> Option<&Arc<dyn Codec>> {
        self.codecs.get(&format)
    }

    /// Returns the codec for `format` or an [`EngineError::UnknownFormat`].
    ///
    /// # Errors
    ///
    /// Fails if no codec is registered for `format`.
    pub fn require(&self, format: FormatId) -> Result<&Arc<dyn Codec>, EngineError> {
        self.get(format)
            .ok_or_else(|| EngineError::unknown_format(format!("no codec for '{format}'")))
    }

    /// Returns the extension used for new files of `format`.
    #[must_use]
    pub fn extension(&self, format: FormatId) -> &'static str {
        self.get(format)
            .and_then(|codec| codec.extensions().first().copied())
            .unwrap_or(format.name())
    }

    /// Returns the registered formats in registration order.
    pub fn formats(&self) -> impl Iterator<Item = FormatId> + '_ {
        self.codecs.keys().copied()
    }

    /// Returns the number of codecs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Returns true if no codec is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}
