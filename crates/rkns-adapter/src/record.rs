use std::collections::BTreeMap;

use rkns_store::{ArrayData, ArrayOptions, Attributes, Group, StoreResult};
use rkns_types::layout;
use serde_json::Value;

/// An array to be written, with its shape and attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordArray {
    pub data: ArrayData,
    pub shape: Vec<u64>,
    pub attrs: Attributes,
}

impl RecordArray {
    pub fn new(data: impl Into<ArrayData>, shape: Vec<u64>) -> Self {
        Self {
            data: data.into(),
            shape,
            attrs: Attributes::new(),
        }
    }

    /// A one-dimensional array.
    pub fn vector(data: impl Into<ArrayData>) -> Self {
        let data = data.into();
        let len = data.len() as u64;
        Self {
            data,
            shape: vec![len],
            attrs: Attributes::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }
}

/// One group of a [`StandardizedRecord`]. Children are kept in sorted maps
/// so that writing a record is deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordGroup {
    pub attrs: Attributes,
    pub arrays: BTreeMap<String, RecordArray>,
    pub groups: BTreeMap<String, RecordGroup>,
}

impl RecordGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<Value>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    pub fn insert_array(&mut self, name: impl Into<String>, array: RecordArray) {
        self.arrays.insert(name.into(), array);
    }

    /// The child group `name`, created empty if missing.
    pub fn group_mut(&mut self, name: &str) -> &mut RecordGroup {
        self.groups.entry(name.to_string()).or_default()
    }

    pub fn group(&self, name: &str) -> Option<&RecordGroup> {
        self.groups.get(name)
    }

    pub fn array(&self, name: &str) -> Option<&RecordArray> {
        self.arrays.get(name)
    }

    /// Follow a `/`-separated path of child groups.
    pub fn resolve(&self, path: &str) -> Option<&RecordGroup> {
        path.split('/')
            .filter(|seg| !seg.is_empty())
            .try_fold(self, |group, seg| group.group(seg))
    }

    /// Arrays in this group and all descendants.
    pub fn array_count(&self) -> usize {
        self.arrays.len() + self.groups.values().map(Self::array_count).sum::<usize>()
    }

    /// Write attributes, arrays and child groups under `target`.
    pub fn write_into(&self, target: &Group, options: &ArrayOptions) -> StoreResult<()> {
        if !self.attrs.is_empty() {
            target.update_attrs(self.attrs.clone())?;
        }
        for (name, array) in &self.arrays {
            let written = target.create_array(name, &array.data, &array.shape, options)?;
            if !array.attrs.is_empty() {
                written.update_attrs(array.attrs.clone())?;
            }
        }
        for (name, group) in &self.groups {
            group.write_into(&target.create_group(name)?, options)?;
        }
        Ok(())
    }
}

/// Adapter output: the content of `/rkns`, built in memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StandardizedRecord {
    pub root: RecordGroup,
}

impl StandardizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &RecordGroup {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut RecordGroup {
        &mut self.root
    }

    /// Array at `path` relative to the record root (`signals/fg_256/signal`).
    pub fn array(&self, path: &str) -> Option<&RecordArray> {
        let (dir, name) = match path.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", path),
        };
        self.root.resolve(dir)?.array(name)
    }

    /// Channel labels in record order, from the root attributes.
    pub fn channel_labels(&self) -> Vec<String> {
        match self.root.attrs.get(layout::attrs::CHANNEL_LABELS) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_labels().len()
    }

    /// Write the record's content into `target` (normally a staged `/rkns`).
    pub fn write_into(&self, target: &Group, options: &ArrayOptions) -> StoreResult<()> {
        self.root.write_into(target, options)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rkns_store::{InMemoryStore, MemberKind};

    use super::*;

    fn sample_record() -> StandardizedRecord {
        let mut record = StandardizedRecord::new();
        record
            .root_mut()
            .set_attr(layout::attrs::CHANNEL_LABELS, vec!["Fp1", "Fp2"]);
        let fg = record.root_mut().group_mut("signals").group_mut("fg_256");
        fg.set_attr(layout::attrs::SAMPLE_RATE, 256.0);
        fg.insert_array(
            "signal",
            RecordArray::new(vec![1i16, 2, 3, 4], vec![2, 2]).with_attr("unit", "uV"),
        );
        record
    }

    #[test]
    fn accessors_follow_paths() {
        let record = sample_record();
        assert_eq!(record.channel_labels(), vec!["Fp1", "Fp2"]);
        assert_eq!(record.channel_count(), 2);
        assert_eq!(record.array("signals/fg_256/signal").unwrap().shape, vec![2, 2]);
        assert!(record.array("signals/fg_512/signal").is_none());
        assert_eq!(record.root().array_count(), 1);
    }

    #[test]
    fn write_into_materializes_tree() {
        let root = Group::create_root(Arc::new(InMemoryStore::new())).unwrap();
        let target = root.create_group("rkns").unwrap();
        sample_record()
            .write_into(&target, &ArrayOptions::default())
            .unwrap();

        let fg = target.resolve("signals/fg_256").unwrap();
        assert_eq!(fg.attr(layout::attrs::SAMPLE_RATE).unwrap(), Some(Value::from(256.0)));
        let signal = fg.array("signal").unwrap();
        assert_eq!(signal.read().unwrap(), ArrayData::I16(vec![1, 2, 3, 4]));
        assert_eq!(signal.attrs().unwrap()["unit"], "uV");
        assert_eq!(target.members().unwrap()[0].kind, MemberKind::Group);
    }

    #[test]
    fn vector_shape_is_length() {
        let arr = RecordArray::vector(vec![0.0f64; 5]);
        assert_eq!(arr.shape, vec![5]);
    }
}
