//! Logical-decoding output plugin driver.
//!
//! [`JsonOutputPlugin`] receives the callback sequence of a decoding
//! session and writes exactly one document per callback to an
//! [`OutputSink`].

use crate::change::ChangeEventEncoder;
use crate::context::EncodeContext;
use crate::format::ensure_supported;
use bottledwater_core::{
    BottledWaterResult, ChangeEvent, ContractViolation, EncoderConfig, WalPosition, Xid,
};

/// Destination of encoded documents.
pub trait OutputSink {
    /// Called before each document is written.
    fn prepare_write(&mut self, last: bool) -> BottledWaterResult<()>;

    /// Append one complete document.
    fn write(&mut self, document: &str, last: bool) -> BottledWaterResult<()>;
}

/// Sink that keeps every document in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    documents: Vec<String>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<String> {
        self.documents
    }
}

impl OutputSink for CollectingSink {
    fn prepare_write(&mut self, _last: bool) -> BottledWaterResult<()> {
        Ok(())
    }

    fn write(&mut self, document: &str, _last: bool) -> BottledWaterResult<()> {
        self.documents.push(document.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PluginState {
    Created,
    Running,
    ShutDown,
}

/// JSON output plugin.
#[derive(Debug)]
pub struct JsonOutputPlugin<S> {
    ctx: EncodeContext,
    sink: S,
    encoder: Option<ChangeEventEncoder>,
    config: Option<EncoderConfig>,
    state: PluginState,
}

impl<S: OutputSink> JsonOutputPlugin<S> {
    pub fn new(ctx: EncodeContext, sink: S) -> Self {
        Self {
            ctx,
            sink,
            encoder: None,
            config: None,
            state: PluginState::Created,
        }
    }

    /// Parse the plugin options and get ready to encode. Only the JSON
    /// format is accepted. The options replace the session zone and buffer
    /// sizing of the context the plugin was created with.
    pub fn startup<I, K, V>(&mut self, options: I) -> BottledWaterResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if self.state != PluginState::Created {
            return Err(invalid_state("startup called twice"));
        }
        let config = EncoderConfig::from_options(options)?;
        ensure_supported(config.format)?;

        let ctx = self.ctx.clone().with_config(&config);
        self.encoder = Some(ChangeEventEncoder::new(ctx));
        tracing::debug!(
            format = %config.format,
            zone_offset = config.session_zone.offset_seconds,
            dbname = self.ctx.database(),
            "output plugin started"
        );
        self.config = Some(config);
        self.state = PluginState::Running;
        Ok(())
    }

    pub fn begin(&mut self, xid: Xid) -> BottledWaterResult<()> {
        let doc = self.encoder()?.encode_begin(xid)?;
        self.emit(&doc)
    }

    pub fn change(&mut self, event: &ChangeEvent) -> BottledWaterResult<()> {
        let doc = self.encoder()?.encode(event)?;
        self.emit(&doc)
    }

    pub fn commit(&mut self, xid: Xid, commit_pos: Option<WalPosition>) -> BottledWaterResult<()> {
        let doc = self.encoder()?.encode_commit(xid, commit_pos)?;
        self.emit(&doc)
    }

    pub fn shutdown(&mut self) -> BottledWaterResult<()> {
        if self.state != PluginState::Running {
            return Err(invalid_state("shutdown without a running session"));
        }
        self.encoder = None;
        self.state = PluginState::ShutDown;
        tracing::debug!(dbname = self.ctx.database(), "output plugin shut down");
        Ok(())
    }

    /// Options in effect after [`startup`](Self::startup).
    pub fn config(&self) -> Option<&EncoderConfig> {
        self.config.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn encoder(&mut self) -> BottledWaterResult<&mut ChangeEventEncoder> {
        match self.state {
            PluginState::Running => self
                .encoder
                .as_mut()
                .ok_or_else(|| invalid_state("encoder missing")),
            PluginState::Created => Err(invalid_state("callback before startup")),
            PluginState::ShutDown => Err(invalid_state("callback after shutdown")),
        }
    }

    fn emit(&mut self, document: &str) -> BottledWaterResult<()> {
        self.sink.prepare_write(true)?;
        self.sink.write(document, true)
    }
}

fn invalid_state(reason: &str) -> bottledwater_core::BottledWaterError {
    ContractViolation::InvalidState {
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::AVRO_NOT_SUPPORTED;
    use bottledwater_catalog::InMemoryCatalog;
    use bottledwater_core::{
        BottledWaterError, ColumnDescriptor, Oid, Relation, Row, RowDescriptor, TypeDescriptor,
        Value,
    };
    use std::sync::Arc;

    fn plugin() -> (JsonOutputPlugin<CollectingSink>, Arc<Relation>) {
        let catalog = InMemoryCatalog::new();
        let rel = catalog
            .add_relation(Relation::table(
                Oid(1),
                "public",
                "t",
                RowDescriptor::new(vec![ColumnDescriptor::new("x", TypeDescriptor::int4())]),
            ))
            .unwrap();
        let ctx = EncodeContext::new("db", Arc::new(catalog));
        (JsonOutputPlugin::new(ctx, CollectingSink::new()), rel)
    }

    #[test]
    fn test_transaction_writes_one_document_per_callback() {
        let (mut plugin, rel) = plugin();
        plugin.startup([("format", "json")]).unwrap();
        plugin.begin(5).unwrap();
        plugin
            .change(&ChangeEvent::insert(5, rel, Row::new(vec![Value::Int(1)])))
            .unwrap();
        plugin.commit(5, None).unwrap();
        plugin.shutdown().unwrap();

        let docs = plugin.into_sink().into_documents();
        assert_eq!(
            docs,
            vec![
                r#"{"command":"BEGIN","xid":5,"dbname":"db"}"#.to_string(),
                r#"{"command":"INSERT","xid":5,"dbname":"db","relname":"t","relnamespace":"public","newtuple":{"x":1}}"#.to_string(),
                r#"{"command":"COMMIT","xid":5,"dbname":"db"}"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_avro_startup_is_rejected() {
        let (mut plugin, _) = plugin();
        assert_eq!(
            plugin.startup([("format", "AVRO")]).unwrap_err(),
            BottledWaterError::UnsupportedFeature {
                message: AVRO_NOT_SUPPORTED
            }
        );
        assert!(plugin.begin(1).unwrap_err().is_contract_violation());
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let (mut plugin, _) = plugin();
        assert!(matches!(
            plugin.startup([("compression", "zstd")]).unwrap_err(),
            BottledWaterError::Config(_)
        ));
    }

    #[test]
    fn test_callbacks_outside_session_fail() {
        let (mut plugin, _) = plugin();
        assert!(plugin.commit(1, None).unwrap_err().is_contract_violation());

        plugin.startup(Vec::<(String, String)>::new()).unwrap();
        plugin.shutdown().unwrap();
        assert!(plugin.begin(2).unwrap_err().is_contract_violation());
        assert!(plugin.shutdown().unwrap_err().is_contract_violation());
        assert!(plugin.sink().documents().is_empty());
    }

    #[test]
    fn test_session_zone_option_applies_to_timestamptz() {
        let catalog = InMemoryCatalog::new();
        let rel = catalog
            .add_relation(Relation::table(
                Oid(2),
                "public",
                "events",
                RowDescriptor::new(vec![ColumnDescriptor::new("at", TypeDescriptor::timestamptz())]),
            ))
            .unwrap();
        let ctx = EncodeContext::new("db", Arc::new(catalog));
        let mut plugin = JsonOutputPlugin::new(ctx, CollectingSink::new());
        plugin
            .startup([
                ("format", "json"),
                ("session_zone_offset_seconds", "7200"),
                ("session_zone_abbreviation", "CEST"),
            ])
            .unwrap();
        plugin
            .change(&ChangeEvent::insert(3, rel, Row::new(vec![Value::TimestampTz(0)])))
            .unwrap();

        assert_eq!(
            plugin.sink().documents(),
            [r#"{"command":"INSERT","xid":3,"dbname":"db","relname":"events","relnamespace":"public","newtuple":{"at":"2000-01-01T02:00:00+02:00 CEST"}}"#]
        );
        assert_eq!(
            plugin.config().map(|config| config.session_zone.offset_seconds),
            Some(7200)
        );
    }

    #[test]
    fn test_failed_change_writes_nothing() {
        let (mut plugin, rel) = plugin();
        plugin.startup([("format", "json")]).unwrap();
        let bad = ChangeEvent::change(bottledwater_core::ChangeKind::Update, 1, rel, None, None);
        assert!(plugin.change(&bad).is_err());
        assert!(plugin.sink().documents().is_empty());
    }
}
