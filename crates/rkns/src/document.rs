use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rkns_adapter::{AdapterError, AdapterRegistry, SourceMetadata};
use rkns_store::{
    content_digest, ArrayData, Attributes, Group, LocalStore, MemberKind, StoreBackend,
    StoreError, StoreLocation,
};
use rkns_types::layout::{self, attrs};
use rkns_types::{ChannelMapping, FormatId, FormatVersion, HistoryEntry, HistoryOperation};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::RknsConfig;
use crate::detector::FormatDetector;
use crate::error::{RknsError, RknsResult};

/// Where a document is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    /// Freshly built from a foreign file; `/rkns` absent.
    ForeignRaw,
    /// Bound to an existing RKNS store; `/rkns` absent.
    RknsLoaded,
    /// `/rkns` is present.
    Populated,
}

/// How [`Document::open_with`] treats a foreign input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenOptions {
    /// Store that receives the new document. Must not exist yet.
    pub target: StoreLocation,
    /// Derive `/rkns` right away. `None` defers to [`RknsConfig::populate_on_open`].
    pub populate: Option<bool>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            target: StoreLocation::Memory,
            populate: None,
        }
    }
}

/// A handle over one RKNS root group.
///
/// A document is either foreign-backed (built here from a foreign file) or
/// RKNS-backed (bound to a store that already declares `format_version`).
/// Operations on one document are sequential; the handle assumes it is the
/// only writer of its store.
///
/// ```text
/// /            format_version, rkns_implementation, created_at
/// /_raw        signal: u8 [size_bytes]   path_basename, source_format, size_bytes, blake3, modification_time
/// /history     one child group per entry, append-only
/// /popis       original label -> standardized id
/// /rkns        absent until populate
/// ```
#[derive(Debug)]
pub struct Document {
    root: Group,
    state: DocumentState,
    /// State to fall back to when `/rkns` is removed.
    base_state: DocumentState,
    config: RknsConfig,
}

/// Physical samples of one frequency group, row-major (time x channel).
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalSignal {
    pub sample_rate: f64,
    pub channels: Vec<String>,
    pub units: Vec<String>,
    pub rows: usize,
    pub samples: Vec<f64>,
}

impl PhysicalSignal {
    /// Samples of the channel at `column`, in time order.
    pub fn column(&self, column: usize) -> Option<Vec<f64>> {
        let width = self.channels.len();
        (column < width).then(|| {
            self.samples
                .iter()
                .skip(column)
                .step_by(width)
                .copied()
                .collect()
        })
    }

    /// Samples of the channel with standardized id `channel`.
    pub fn channel(&self, channel: &str) -> Option<Vec<f64>> {
        let column = self.channels.iter().position(|c| c == channel)?;
        self.column(column)
    }
}

/// Summary of one frequency group for [`DocumentInfo`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrequencyGroupInfo {
    pub name: String,
    pub sample_rate: Option<f64>,
    pub channels: Vec<String>,
    pub samples_per_channel: u64,
}

/// Serializable overview of a document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub location: String,
    pub state: DocumentState,
    pub format_version: String,
    pub implementation: Option<String>,
    pub created_at: Option<String>,
    pub source: SourceMetadata,
    pub frequency_groups: Vec<FrequencyGroupInfo>,
    pub annotations: u64,
    pub history_entries: usize,
}

impl Document {
    // -----------------------------------------------------------------------
    // Opening
    // -----------------------------------------------------------------------

    /// Open `path` with the default options: a foreign file lands in an
    /// in-memory store.
    pub fn open(
        path: impl AsRef<Path>,
        registry: &AdapterRegistry,
        config: &RknsConfig,
    ) -> RknsResult<Self> {
        Self::open_with(path, registry, config, OpenOptions::default())
    }

    /// Detect what `path` holds and bind or build a document from it.
    pub fn open_with(
        path: impl AsRef<Path>,
        registry: &AdapterRegistry,
        config: &RknsConfig,
        options: OpenOptions,
    ) -> RknsResult<Self> {
        let path = path.as_ref();
        let detector = FormatDetector::new(registry, config.detect_prefix_len);
        match detector.detect_path(path)? {
            FormatId::Unknown => Err(RknsError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
            FormatId::Rkns => Self::initialize_from_rkns(path, config),
            format => {
                let store = options.target.create().map_err(target_error)?;
                let mut document =
                    Self::initialize_from_foreign(path, format, store, registry, config)?;
                if options.populate.unwrap_or(config.populate_on_open) {
                    document.populate(registry)?;
                }
                Ok(document)
            }
        }
    }

    /// Bind an RKNS directory store.
    pub fn initialize_from_rkns(path: impl AsRef<Path>, config: &RknsConfig) -> RknsResult<Self> {
        let store: Arc<dyn StoreBackend> = Arc::new(LocalStore::open(path.as_ref())?);
        Self::load(store, config)
    }

    /// Bind any backend whose root declares this build's `format_version`.
    ///
    /// Only reads: on `VersionMismatch` the store is left as it was.
    pub fn load(store: Arc<dyn StoreBackend>, config: &RknsConfig) -> RknsResult<Self> {
        let location = store.describe();
        let root = Group::open_root(store).map_err(|e| match e {
            StoreError::NotFound(_) => {
                RknsError::InvalidDocument(format!("{location} has no root group"))
            }
            e => e.into(),
        })?;
        check_version(root.attr(attrs::FORMAT_VERSION)?)?;

        let state = if root.contains_group(layout::RKNS)? {
            DocumentState::Populated
        } else {
            DocumentState::RknsLoaded
        };
        info!(location = %location, state = ?state, "document loaded");
        Ok(Self {
            root,
            state,
            base_state: DocumentState::RknsLoaded,
            config: config.clone(),
        })
    }

    /// Embed the foreign file at `path` into a fresh root in `store`.
    pub fn initialize_from_foreign(
        path: impl AsRef<Path>,
        format: FormatId,
        store: Arc<dyn StoreBackend>,
        registry: &AdapterRegistry,
        config: &RknsConfig,
    ) -> RknsResult<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|e| RknsError::source_io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut source = SourceMetadata::for_bytes(name, format, &raw);
        source.modification_time = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true));
        Self::initialize_from_bytes(&raw, source, store, registry, config)
    }

    /// Embed `raw` into a fresh root in `store`.
    ///
    /// Size and digest in `source` are recomputed from `raw`. The root only
    /// receives `format_version` after every other node is written, so an
    /// interrupted build is never detected as RKNS.
    pub fn initialize_from_bytes(
        raw: &[u8],
        source: SourceMetadata,
        store: Arc<dyn StoreBackend>,
        registry: &AdapterRegistry,
        config: &RknsConfig,
    ) -> RknsResult<Self> {
        let format = source.source_format;
        if !format.is_foreign() {
            return Err(RknsError::UnsupportedFormat {
                path: source.path_basename,
            });
        }
        let adapter = registry.get(format).map_err(adapter_error)?;
        let source = SourceMetadata {
            size_bytes: raw.len() as u64,
            blake3: content_digest(raw),
            ..source
        };

        let root = Group::create_root(store).map_err(target_error)?;
        root.update_attrs(Attributes::from_iter([
            (attrs::IMPLEMENTATION.to_string(), Value::from(layout::IMPLEMENTATION_NAME)),
            (
                attrs::CREATED_AT.to_string(),
                Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            ),
        ]))?;

        let raw_options = config.raw_array_options();
        root.create_group_atomic::<RknsError, _>(layout::RAW, |group| {
            group.create_array(
                layout::RAW_SIGNAL,
                &ArrayData::U8(raw.to_vec()),
                &[raw.len() as u64],
                &raw_options,
            )?;
            group.update_attrs(raw_attributes(&source))?;
            Ok(())
        })?;
        root.create_group(layout::HISTORY)?;

        let mapping = adapter.extract_channel_mapping(raw);
        root.create_group(layout::POPIS)?
            .replace_attrs(&mapping.to_attributes())?;

        root.set_attr(attrs::FORMAT_VERSION, FormatVersion::CURRENT.to_string())?;
        info!(
            source = %source.path_basename,
            format = %format,
            size_bytes = source.size_bytes,
            channels = mapping.len(),
            location = %root.store().describe(),
            "foreign file embedded"
        );
        Ok(Self {
            root,
            state: DocumentState::ForeignRaw,
            base_state: DocumentState::ForeignRaw,
            config: config.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn is_populated(&self) -> bool {
        self.state == DocumentState::Populated
    }

    /// `true` if this handle built the document from a foreign file.
    pub fn is_foreign_backed(&self) -> bool {
        self.base_state == DocumentState::ForeignRaw
    }

    pub fn config(&self) -> &RknsConfig {
        &self.config
    }

    pub fn format_version(&self) -> RknsResult<FormatVersion> {
        match self.root.attr(attrs::FORMAT_VERSION)? {
            Some(Value::String(v)) => Ok(v.parse()?),
            other => Err(RknsError::InvalidDocument(format!(
                "format_version is {}",
                other.map_or_else(|| "missing".to_string(), |v| v.to_string())
            ))),
        }
    }

    /// The standardized record, once populated.
    pub fn rkns(&self) -> RknsResult<Group> {
        self.root.group(layout::RKNS).map_err(|e| match e {
            StoreError::NotFound(group) => RknsError::NotPopulated { group },
            e => e.into(),
        })
    }

    pub fn tree(&self) -> RknsResult<String> {
        Ok(self.root.tree()?)
    }

    // -----------------------------------------------------------------------
    // Raw blob
    // -----------------------------------------------------------------------

    /// Source metadata as recorded in `/_raw`, with the current `/popis`
    /// mapping attached.
    pub fn source_metadata(&self) -> RknsResult<SourceMetadata> {
        let attributes = self.required_group(layout::RAW)?.attrs()?;
        let text = |key: &str| -> RknsResult<String> {
            attributes
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| RknsError::InvalidDocument(format!("/_raw is missing {key}")))
        };
        let size_bytes = attributes
            .get(attrs::SIZE_BYTES)
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                RknsError::InvalidDocument(format!("/_raw is missing {}", attrs::SIZE_BYTES))
            })?;

        Ok(SourceMetadata {
            path_basename: text(attrs::PATH_BASENAME)?,
            source_format: text(attrs::SOURCE_FORMAT)?.parse()?,
            size_bytes,
            blake3: text(attrs::BLAKE3)?,
            modification_time: attributes
                .get(attrs::MODIFICATION_TIME)
                .and_then(Value::as_str)
                .map(str::to_string),
            channel_mapping: self.channel_mapping()?,
        })
    }

    /// The embedded file, byte for byte, checked against the recorded digest.
    pub fn extract_raw_bytes(&self) -> RknsResult<Vec<u8>> {
        let group = self.required_group(layout::RAW)?;
        let bytes = group.array(layout::RAW_SIGNAL)?.read_bytes()?;
        let expected = group
            .attr(attrs::BLAKE3)?
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| RknsError::InvalidDocument("/_raw is missing blake3".into()))?;
        let computed = content_digest(&bytes);
        if computed != expected {
            return Err(RknsError::RawDigestMismatch { expected, computed });
        }
        Ok(bytes)
    }

    /// Write the embedded file to `path`, which must not exist.
    pub fn reconstruct_original_file(&self, path: impl AsRef<Path>) -> RknsResult<u64> {
        let path = path.as_ref();
        let bytes = self.extract_raw_bytes()?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    RknsError::TargetExists(path.display().to_string())
                }
                _ => RknsError::source_io(path, e),
            })?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| RknsError::source_io(path, e))?;
        info!(path = %path.display(), bytes = bytes.len(), "original file reconstructed");
        Ok(bytes.len() as u64)
    }

    // -----------------------------------------------------------------------
    // Populate / reset
    // -----------------------------------------------------------------------

    /// Derive `/rkns` from the raw blob. Once only; see [`Document::reset`].
    ///
    /// Any failure leaves `/rkns` absent and the document usable, so a
    /// missing adapter can be registered and the call retried.
    pub fn populate(&mut self, registry: &AdapterRegistry) -> RknsResult<()> {
        if self.root.contains(layout::RKNS)? {
            return Err(RknsError::AlreadyPopulated {
                group: format!("/{}", layout::RKNS),
            });
        }
        // An unreadable /history must fail before /rkns is committed.
        let seq = self.next_history_seq()?;
        let details = self.derive(registry)?;
        self.write_history_entry(seq, HistoryOperation::Populated, details)?;
        Ok(())
    }

    /// Drop `/rkns` if present and derive it again from the raw blob.
    pub fn reset(&mut self, registry: &AdapterRegistry) -> RknsResult<()> {
        let seq = self.next_history_seq()?;
        let replaced = self.root.delete_member(layout::RKNS)?;
        self.state = self.base_state;
        debug!(replaced, "standardized record cleared");

        let mut details = self.derive(registry)?;
        if let Value::Object(map) = &mut details {
            map.insert("replaced".into(), Value::Bool(replaced));
        }
        self.write_history_entry(seq, HistoryOperation::Reset, details)?;
        Ok(())
    }

    fn derive(&mut self, registry: &AdapterRegistry) -> RknsResult<Value> {
        let source = self.source_metadata()?;
        let format = source.source_format;
        let adapter = registry.get(format).map_err(adapter_error)?;
        let raw = self.extract_raw_bytes()?;

        let record = adapter.transform(&raw, &source).map_err(|e| match e {
            AdapterError::CorruptSource { reason } => RknsError::CorruptSource { format, reason },
            e => e.into(),
        })?;

        let options = self.config.signal_array_options();
        self.root
            .create_group_atomic::<RknsError, _>(layout::RKNS, |group| {
                record.write_into(group, &options)?;
                Ok(())
            })?;
        self.state = DocumentState::Populated;
        info!(
            adapter = adapter.name(),
            format = %format,
            channels = record.channel_count(),
            arrays = record.root().array_count(),
            "standardized record written"
        );
        Ok(json!({
            "adapter": adapter.name(),
            "source_format": format.tag(),
            "channels": record.channel_count(),
            "arrays": record.root().array_count(),
        }))
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Every history entry, in append order.
    pub fn history(&self) -> RknsResult<Vec<HistoryEntry>> {
        let group = self.required_group(layout::HISTORY)?;
        let mut entries = Vec::new();
        for member in group.members()? {
            if member.kind != MemberKind::Group {
                continue;
            }
            let attributes = group.group(&member.name)?.attrs()?;
            entries.push(HistoryEntry::from_attributes(&attributes)?);
        }
        entries.sort_by_key(|e| e.seq);
        Ok(entries)
    }

    /// Append an entry. Existing entries are never touched.
    pub fn append_history(
        &self,
        operation: HistoryOperation,
        details: Value,
    ) -> RknsResult<HistoryEntry> {
        let seq = self.next_history_seq()?;
        self.write_history_entry(seq, operation, details)
    }

    fn next_history_seq(&self) -> RknsResult<u64> {
        Ok(self.history()?.last().map_or(0, |e| e.seq) + 1)
    }

    fn write_history_entry(
        &self,
        seq: u64,
        operation: HistoryOperation,
        details: Value,
    ) -> RknsResult<HistoryEntry> {
        let group = self.required_group(layout::HISTORY)?;
        let entry = HistoryEntry::new(seq, operation, details);
        let attributes = entry.to_attributes()?;
        group.create_group_atomic::<RknsError, _>(&entry.node_name(), |node| {
            node.replace_attrs(&attributes)?;
            Ok(())
        })?;
        debug!(seq, operation = %entry.operation, "history entry appended");
        Ok(entry)
    }

    // -----------------------------------------------------------------------
    // Channels and signals
    // -----------------------------------------------------------------------

    pub fn channel_mapping(&self) -> RknsResult<ChannelMapping> {
        let attributes = self.required_group(layout::POPIS)?.attrs()?;
        Ok(ChannelMapping::from_attributes(&attributes)?)
    }

    /// Replace the `/popis` mapping.
    ///
    /// The new mapping must cover exactly the current labels. `/rkns` keeps
    /// the ids it was derived with until the next reset.
    pub fn remap_channels(&mut self, mapping: ChannelMapping) -> RknsResult<()> {
        let current = self.channel_mapping()?;
        if !current.same_labels(&mapping) {
            let missing: Vec<&str> = current.labels().filter(|l| !mapping.contains(l)).collect();
            let unknown: Vec<&str> = mapping.labels().filter(|l| !current.contains(l)).collect();
            return Err(RknsError::InvalidChannelMapping(format!(
                "labels must stay the same (missing {missing:?}, unknown {unknown:?})"
            )));
        }

        let changed: serde_json::Map<String, Value> = mapping
            .iter()
            .filter(|&(label, id)| current.get(label) != Some(id))
            .map(|(label, id)| {
                (
                    label.to_string(),
                    json!({ "from": current.get(label), "to": id }),
                )
            })
            .collect();
        let seq = self.next_history_seq()?;
        self.required_group(layout::POPIS)?
            .replace_attrs(&mapping.to_attributes())?;
        self.write_history_entry(
            seq,
            HistoryOperation::ChannelsRemapped,
            json!({ "changed": changed }),
        )?;
        info!(changed = changed.len(), "channel mapping replaced");
        Ok(())
    }

    /// Names of the frequency groups under `/rkns/signals`, ascending.
    pub fn frequency_groups(&self) -> RknsResult<Vec<String>> {
        let signals = self.rkns()?.group(layout::SIGNALS)?;
        Ok(signals
            .members()?
            .into_iter()
            .filter(|m| m.kind == MemberKind::Group)
            .map(|m| m.name)
            .collect())
    }

    /// Digital samples of frequency group `name` converted to physical units
    /// with the group's `signal_minmaxs`.
    pub fn signal_physical(&self, name: &str) -> RknsResult<PhysicalSignal> {
        let group = self.rkns()?.group(layout::SIGNALS)?.group(name)?;
        let signal = group.array(layout::SIGNAL)?;
        let minmaxs = group.array(layout::SIGNAL_MINMAXS)?.read()?.to_f64_vec();
        let digital = signal.read()?.to_f64_vec();
        let width = signal.meta().row_len() as usize;
        if minmaxs.len() != 4 * width {
            return Err(RknsError::InvalidDocument(format!(
                "{}: signal_minmaxs holds {} values for {width} channels",
                group.display_path(),
                minmaxs.len()
            )));
        }

        let (pmin, rest) = minmaxs.split_at(width);
        let (pmax, rest) = rest.split_at(width);
        let (dmin, dmax) = rest.split_at(width);
        let samples = digital
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let c = i % width;
                (d - dmin[c]) * (pmax[c] - pmin[c]) / (dmax[c] - dmin[c]) + pmin[c]
            })
            .collect();

        let attributes = group.attrs()?;
        Ok(PhysicalSignal {
            sample_rate: attributes
                .get(attrs::SAMPLE_RATE)
                .and_then(Value::as_f64)
                .unwrap_or_default(),
            channels: string_list(&attributes, attrs::CHANNELS),
            units: string_list(&attributes, attrs::UNITS),
            rows: signal.meta().rows() as usize,
            samples,
        })
    }

    // -----------------------------------------------------------------------
    // Export / info
    // -----------------------------------------------------------------------

    /// Copy the whole document into `target` and bind the copy.
    pub fn export(&self, target: Arc<dyn StoreBackend>) -> RknsResult<Document> {
        let location = target.describe();
        if target.exists(".zgroup")? {
            return Err(RknsError::TargetExists(location));
        }
        let dest = Group::create_root(Arc::clone(&target)).map_err(target_error)?;
        let keys = self.root.copy_into(&dest)?;
        info!(to = %location, keys, "document exported");
        Self::load(target, &self.config)
    }

    /// Export into a store created at `location`.
    pub fn export_to(&self, location: &StoreLocation) -> RknsResult<Document> {
        self.export(location.create().map_err(target_error)?)
    }

    pub fn info(&self) -> RknsResult<DocumentInfo> {
        let root_attrs = self.root.attrs()?;
        let text = |key: &str| root_attrs.get(key).and_then(Value::as_str).map(str::to_string);

        let mut frequency_groups = Vec::new();
        let mut annotations = 0;
        if self.root.contains_group(layout::RKNS)? {
            let signals = self.rkns()?.group(layout::SIGNALS)?;
            for name in self.frequency_groups()? {
                let group = signals.group(&name)?;
                let attributes = group.attrs()?;
                frequency_groups.push(FrequencyGroupInfo {
                    sample_rate: attributes.get(attrs::SAMPLE_RATE).and_then(Value::as_f64),
                    channels: string_list(&attributes, attrs::CHANNELS),
                    samples_per_channel: group.array(layout::SIGNAL)?.meta().rows(),
                    name,
                });
            }
            let rkns = self.rkns()?;
            if rkns.contains_group(layout::ANNOTATIONS)? {
                annotations = rkns.group(layout::ANNOTATIONS)?.array("onset")?.meta().len();
            }
        }

        Ok(DocumentInfo {
            location: self.root.store().describe(),
            state: self.state,
            format_version: self.format_version()?.to_string(),
            implementation: text(attrs::IMPLEMENTATION),
            created_at: text(attrs::CREATED_AT),
            source: self.source_metadata()?,
            frequency_groups,
            annotations,
            history_entries: self.history()?.len(),
        })
    }

    fn required_group(&self, name: &str) -> RknsResult<Group> {
        self.root.group(name).map_err(|e| match e {
            StoreError::NotFound(path) => {
                RknsError::InvalidDocument(format!("{path} is missing"))
            }
            e => e.into(),
        })
    }
}

fn check_version(found: Option<Value>) -> RknsResult<()> {
    let mismatch = |found: Option<String>| RknsError::VersionMismatch {
        expected: FormatVersion::CURRENT,
        found,
    };
    let text = match found {
        None => return Err(mismatch(None)),
        Some(Value::String(text)) => text,
        Some(other) => return Err(mismatch(Some(other.to_string()))),
    };
    match text.parse::<FormatVersion>() {
        Ok(version) if version.is_compatible_with(&FormatVersion::CURRENT) => Ok(()),
        _ => Err(mismatch(Some(text))),
    }
}

fn raw_attributes(source: &SourceMetadata) -> Attributes {
    Attributes::from_iter([
        (attrs::PATH_BASENAME.to_string(), Value::from(source.path_basename.clone())),
        (attrs::SOURCE_FORMAT.to_string(), Value::from(source.source_format.tag())),
        (attrs::SIZE_BYTES.to_string(), Value::from(source.size_bytes)),
        (attrs::BLAKE3.to_string(), Value::from(source.blake3.clone())),
        (
            attrs::MODIFICATION_TIME.to_string(),
            source.modification_time.clone().map_or(Value::Null, Value::from),
        ),
    ])
}

fn string_list(attributes: &Attributes, key: &str) -> Vec<String> {
    attributes
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn adapter_error(e: AdapterError) -> RknsError {
    match e {
        AdapterError::NotFound(format) => RknsError::NoAdapterForFormat(format),
        e => e.into(),
    }
}

fn target_error(e: StoreError) -> RknsError {
    match e {
        StoreError::AlreadyExists(location) => RknsError::TargetExists(location),
        e => e.into(),
    }
}
