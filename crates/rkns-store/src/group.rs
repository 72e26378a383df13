use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::array::{display_path, Array, ArrayData, ArrayOptions, ARRAY_MARKER};
use crate::backend::StoreBackend;
use crate::error::{StoreError, StoreResult};

/// JSON attribute map attached to a group or array.
pub type Attributes = serde_json::Map<String, Value>;

/// Marker key of a group node. Written last when a group is created.
pub(crate) const GROUP_MARKER: &str = ".zgroup";
pub(crate) const ATTRS_KEY: &str = ".zattrs";

const GROUP_MARKER_BODY: &[u8] = br#"{"zarr_format":2}"#;

pub(crate) fn node_key(path: &str, leaf: &str) -> String {
    if path.is_empty() {
        leaf.to_string()
    } else {
        format!("{path}/{leaf}")
    }
}

pub(crate) fn read_attrs(store: &dyn StoreBackend, path: &str) -> StoreResult<Attributes> {
    match store.get(&node_key(path, ATTRS_KEY))? {
        Some(raw) => {
            serde_json::from_slice(&raw).map_err(|e| StoreError::Serialization(e.to_string()))
        }
        None => Ok(Attributes::new()),
    }
}

pub(crate) fn write_attrs(store: &dyn StoreBackend, path: &str, attrs: &Attributes) -> StoreResult<()> {
    let raw = serde_json::to_vec(attrs).map_err(|e| StoreError::Serialization(e.to_string()))?;
    store.set(&node_key(path, ATTRS_KEY), &raw)
}

/// Kind of a group member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemberKind {
    Group,
    Array,
}

/// A direct child of a group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
}

/// Handle to a group node in a store.
///
/// Groups are cheap to clone: a shared backend plus a `/`-separated path
/// (empty for the root).
#[derive(Clone)]
pub struct Group {
    store: Arc<dyn StoreBackend>,
    path: String,
}

impl Group {
    /// Write the root group marker into an empty store.
    pub fn create_root(store: Arc<dyn StoreBackend>) -> StoreResult<Self> {
        if store.exists(GROUP_MARKER)? {
            return Err(StoreError::AlreadyExists("/".into()));
        }
        store.set(GROUP_MARKER, GROUP_MARKER_BODY)?;
        Ok(Self {
            store,
            path: String::new(),
        })
    }

    /// Open the root group of an existing store.
    pub fn open_root(store: Arc<dyn StoreBackend>) -> StoreResult<Self> {
        if !store.exists(GROUP_MARKER)? {
            return Err(StoreError::NotFound("/".into()));
        }
        Ok(Self {
            store,
            path: String::new(),
        })
    }

    pub fn store(&self) -> &Arc<dyn StoreBackend> {
        &self.store
    }

    /// Path relative to the root, without a leading slash.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Absolute display path (`/`, `/rkns/signals`).
    pub fn display_path(&self) -> String {
        display_path(&self.path)
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    fn prefix(&self) -> String {
        if self.path.is_empty() {
            String::new()
        } else {
            format!("{}/", self.path)
        }
    }

    fn child_path(&self, name: &str) -> StoreResult<String> {
        if name.is_empty() || name.contains('/') || name.starts_with('.') {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(node_key(&self.path, name))
    }

    fn child(&self, path: String) -> Self {
        Self {
            store: Arc::clone(&self.store),
            path,
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    pub fn contains_group(&self, name: &str) -> StoreResult<bool> {
        let path = self.child_path(name)?;
        self.store.exists(&node_key(&path, GROUP_MARKER))
    }

    pub fn contains_array(&self, name: &str) -> StoreResult<bool> {
        let path = self.child_path(name)?;
        self.store.exists(&node_key(&path, ARRAY_MARKER))
    }

    pub fn contains(&self, name: &str) -> StoreResult<bool> {
        Ok(self.contains_group(name)? || self.contains_array(name)?)
    }

    /// Direct children, sorted by name.
    pub fn members(&self) -> StoreResult<Vec<Member>> {
        let prefix = self.prefix();
        let mut members = Vec::new();
        for key in self.store.list_prefix(&prefix)? {
            let rest = &key[prefix.len()..];
            let Some((name, leaf)) = rest.split_once('/') else {
                continue;
            };
            let kind = match leaf {
                GROUP_MARKER => MemberKind::Group,
                ARRAY_MARKER => MemberKind::Array,
                _ => continue,
            };
            members.push(Member {
                name: name.to_string(),
                kind,
            });
        }
        members.sort();
        Ok(members)
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Create an empty child group.
    pub fn create_group(&self, name: &str) -> StoreResult<Self> {
        let path = self.child_path(name)?;
        if self.contains(name)? {
            return Err(StoreError::AlreadyExists(display_path(&path)));
        }
        self.store
            .set(&node_key(&path, GROUP_MARKER), GROUP_MARKER_BODY)?;
        Ok(self.child(path))
    }

    /// Build a child group so that it either appears complete or not at all.
    ///
    /// `build` fills a staged group whose marker is not yet written, so the
    /// child is invisible to `contains_group` and `members` while it runs.
    /// The marker is written only after `build` succeeds; on any error every
    /// key under the staged prefix is removed.
    pub fn create_group_atomic<E, F>(&self, name: &str, build: F) -> Result<Self, E>
    where
        E: From<StoreError>,
        F: FnOnce(&Group) -> Result<(), E>,
    {
        let path = self.child_path(name)?;
        if self.contains(name)? {
            return Err(StoreError::AlreadyExists(display_path(&path)).into());
        }
        let staged = self.child(path);
        let staged_prefix = staged.prefix();
        // Leftovers from an interrupted build would otherwise leak into this one.
        self.store.delete_prefix(&staged_prefix)?;

        let outcome = build(&staged).and_then(|()| {
            self.store
                .set(&node_key(&staged.path, GROUP_MARKER), GROUP_MARKER_BODY)
                .map_err(E::from)
        });

        match outcome {
            Ok(()) => {
                debug!(path = %staged.display_path(), "group committed");
                Ok(staged)
            }
            Err(e) => {
                let removed = self.store.delete_prefix(&staged_prefix).unwrap_or(0);
                warn!(
                    path = %staged.display_path(),
                    removed_keys = removed,
                    "group build failed, staged keys rolled back"
                );
                Err(e)
            }
        }
    }

    /// Open a child group.
    pub fn group(&self, name: &str) -> StoreResult<Self> {
        let path = self.child_path(name)?;
        if self.store.exists(&node_key(&path, GROUP_MARKER))? {
            return Ok(self.child(path));
        }
        if self.store.exists(&node_key(&path, ARRAY_MARKER))? {
            return Err(StoreError::WrongNodeKind {
                path: display_path(&path),
                expected: "group",
            });
        }
        Err(StoreError::NotFound(display_path(&path)))
    }

    /// Walk a `/`-separated path of nested groups.
    pub fn resolve(&self, path: &str) -> StoreResult<Self> {
        path.split('/')
            .filter(|seg| !seg.is_empty())
            .try_fold(self.clone(), |group, seg| group.group(seg))
    }

    /// Remove a child group or array and everything under it.
    pub fn delete_member(&self, name: &str) -> StoreResult<bool> {
        let path = self.child_path(name)?;
        let removed = self.store.delete_prefix(&format!("{path}/"))?;
        if removed > 0 {
            debug!(path = %display_path(&path), removed_keys = removed, "member deleted");
        }
        Ok(removed > 0)
    }

    // -----------------------------------------------------------------------
    // Arrays
    // -----------------------------------------------------------------------

    /// Write a new child array of the given shape.
    pub fn create_array(
        &self,
        name: &str,
        data: &ArrayData,
        shape: &[u64],
        options: &ArrayOptions,
    ) -> StoreResult<Array> {
        let path = self.child_path(name)?;
        if self.contains(name)? {
            return Err(StoreError::AlreadyExists(display_path(&path)));
        }
        Array::create(Arc::clone(&self.store), path, data, shape, options)
    }

    /// Open a child array.
    pub fn array(&self, name: &str) -> StoreResult<Array> {
        let path = self.child_path(name)?;
        if self.store.exists(&node_key(&path, GROUP_MARKER))? {
            return Err(StoreError::WrongNodeKind {
                path: display_path(&path),
                expected: "array",
            });
        }
        Array::open(Arc::clone(&self.store), path)
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    pub fn attrs(&self) -> StoreResult<Attributes> {
        read_attrs(self.store.as_ref(), &self.path)
    }

    pub fn attr(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.attrs()?.remove(key))
    }

    pub fn set_attr(&self, key: &str, value: impl Into<Value>) -> StoreResult<()> {
        let mut attrs = self.attrs()?;
        attrs.insert(key.to_string(), value.into());
        write_attrs(self.store.as_ref(), &self.path, &attrs)
    }

    /// Merge `update` into the existing attributes.
    pub fn update_attrs(&self, update: Attributes) -> StoreResult<()> {
        let mut attrs = self.attrs()?;
        attrs.extend(update);
        write_attrs(self.store.as_ref(), &self.path, &attrs)
    }

    /// Replace all attributes.
    pub fn replace_attrs(&self, attrs: &Attributes) -> StoreResult<()> {
        write_attrs(self.store.as_ref(), &self.path, attrs)
    }

    // -----------------------------------------------------------------------
    // Whole-tree operations
    // -----------------------------------------------------------------------

    /// Copy every key under this group into `dest`, byte for byte.
    ///
    /// Chunks are copied without decoding, so array digests carry over.
    pub fn copy_into(&self, dest: &Group) -> StoreResult<usize> {
        let prefix = self.prefix();
        let keys = self.store.list_prefix(&prefix)?;
        for key in &keys {
            let value = self
                .store
                .get(key)?
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            dest.store
                .set(&node_key(&dest.path, &key[prefix.len()..]), &value)?;
        }
        debug!(
            from = %self.display_path(),
            to = %dest.store.describe(),
            keys = keys.len(),
            "group copied"
        );
        Ok(keys.len())
    }

    /// First structural difference between two subtrees, if any.
    ///
    /// Compares attributes, member names and kinds, and array dtype, shape
    /// and content digest, recursing into child groups.
    pub fn first_difference(&self, other: &Group) -> StoreResult<Option<String>> {
        let here = self.display_path();
        if self.attrs()? != other.attrs()? {
            return Ok(Some(format!("{here}: attributes differ")));
        }
        let mine = self.members()?;
        let theirs = other.members()?;
        if mine != theirs {
            return Ok(Some(format!("{here}: members differ")));
        }
        for member in mine {
            match member.kind {
                MemberKind::Group => {
                    let diff = self
                        .group(&member.name)?
                        .first_difference(&other.group(&member.name)?)?;
                    if diff.is_some() {
                        return Ok(diff);
                    }
                }
                MemberKind::Array => {
                    let a = self.array(&member.name)?;
                    let b = other.array(&member.name)?;
                    if a.dtype() != b.dtype() || a.shape() != b.shape() {
                        return Ok(Some(format!("{}: layout differs", display_path(a.path()))));
                    }
                    if a.digest() != b.digest() {
                        return Ok(Some(format!("{}: data differs", display_path(a.path()))));
                    }
                    if a.attrs()? != b.attrs()? {
                        return Ok(Some(format!(
                            "{}: attributes differ",
                            display_path(a.path())
                        )));
                    }
                }
            }
        }
        Ok(None)
    }

    pub fn deep_eq(&self, other: &Group) -> StoreResult<bool> {
        Ok(self.first_difference(other)?.is_none())
    }

    /// Indented listing of the subtree, arrays annotated with dtype and shape.
    pub fn tree(&self) -> StoreResult<String> {
        let mut out = String::new();
        out.push_str(&self.display_path());
        out.push('\n');
        self.render_tree(&mut out, "")?;
        Ok(out)
    }

    fn render_tree(&self, out: &mut String, indent: &str) -> StoreResult<()> {
        let members = self.members()?;
        let count = members.len();
        for (i, member) in members.into_iter().enumerate() {
            let last = i + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            match member.kind {
                MemberKind::Group => {
                    out.push_str(&format!("{indent}{branch}{}\n", member.name));
                    let next = format!("{indent}{}", if last { "    " } else { "│   " });
                    self.group(&member.name)?.render_tree(out, &next)?;
                }
                MemberKind::Array => {
                    let array = self.array(&member.name)?;
                    out.push_str(&format!(
                        "{indent}{branch}{} ({} {:?})\n",
                        member.name,
                        array.dtype(),
                        array.shape()
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("path", &self.display_path())
            .field("store", &self.store.describe())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    fn root() -> Group {
        Group::create_root(Arc::new(InMemoryStore::new())).unwrap()
    }

    // ---- Structure ----

    #[test]
    fn root_must_exist_to_open() {
        let store: Arc<dyn StoreBackend> = Arc::new(InMemoryStore::new());
        assert!(matches!(
            Group::open_root(Arc::clone(&store)),
            Err(StoreError::NotFound(_))
        ));
        Group::create_root(Arc::clone(&store)).unwrap();
        assert!(Group::open_root(Arc::clone(&store)).unwrap().is_root());
        assert!(matches!(
            Group::create_root(store),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn nested_groups_and_members() {
        let root = root();
        let rkns = root.create_group("rkns").unwrap();
        rkns.create_group("signals").unwrap();
        rkns.create_array("onset", &ArrayData::F64(vec![1.0]), &[1], &ArrayOptions::default())
            .unwrap();
        root.create_group("_raw").unwrap();

        assert_eq!(
            root.members().unwrap(),
            vec![
                Member { name: "_raw".into(), kind: MemberKind::Group },
                Member { name: "rkns".into(), kind: MemberKind::Group },
            ]
        );
        assert_eq!(
            rkns.members().unwrap(),
            vec![
                Member { name: "onset".into(), kind: MemberKind::Array },
                Member { name: "signals".into(), kind: MemberKind::Group },
            ]
        );
        assert_eq!(root.resolve("rkns/signals").unwrap().path(), "rkns/signals");
    }

    #[test]
    fn duplicate_and_invalid_names_are_refused() {
        let root = root();
        root.create_group("a").unwrap();
        assert!(matches!(root.create_group("a"), Err(StoreError::AlreadyExists(_))));
        assert!(matches!(root.create_group("a/b"), Err(StoreError::InvalidName(_))));
        assert!(matches!(root.create_group(".zattrs"), Err(StoreError::InvalidName(_))));
        assert!(matches!(root.create_group(""), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn wrong_node_kind_is_reported() {
        let root = root();
        root.create_array("x", &ArrayData::U8(vec![1]), &[1], &ArrayOptions::default())
            .unwrap();
        root.create_group("g").unwrap();
        assert!(matches!(root.group("x"), Err(StoreError::WrongNodeKind { .. })));
        assert!(matches!(root.array("g"), Err(StoreError::WrongNodeKind { .. })));
        assert!(matches!(root.group("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_member_removes_subtree() {
        let root = root();
        let g = root.create_group("rkns").unwrap();
        g.create_array("a", &ArrayData::U8(vec![1, 2]), &[2], &ArrayOptions::default())
            .unwrap();
        assert!(root.delete_member("rkns").unwrap());
        assert!(!root.contains_group("rkns").unwrap());
        assert!(!root.delete_member("rkns").unwrap());
    }

    // ---- Atomic creation ----

    #[test]
    fn atomic_group_appears_only_after_build() {
        let root = root();
        let built = root
            .create_group_atomic::<StoreError, _>("rkns", |staged| {
                assert!(!root.contains_group("rkns")?);
                staged.create_group("signals")?;
                staged.set_attr("n", 2)?;
                Ok(())
            })
            .unwrap();
        assert!(root.contains_group("rkns").unwrap());
        assert_eq!(built.attr("n").unwrap(), Some(Value::from(2)));
        assert!(built.contains_group("signals").unwrap());
    }

    #[test]
    fn failed_atomic_build_leaves_nothing() {
        let store: Arc<dyn StoreBackend> = Arc::new(InMemoryStore::new());
        let root = Group::create_root(Arc::clone(&store)).unwrap();
        let before = store.list_prefix("").unwrap();
        let err = root
            .create_group_atomic::<StoreError, _>("rkns", |staged| {
                staged.create_group("signals")?;
                staged.create_array("x", &ArrayData::U8(vec![1]), &[1], &ArrayOptions::default())?;
                Err(StoreError::Serialization("boom".into()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        assert_eq!(store.list_prefix("").unwrap(), before);
    }

    // ---- Attributes ----

    #[test]
    fn attrs_merge_and_replace() {
        let root = root();
        root.set_attr("a", 1).unwrap();
        let mut update = Attributes::new();
        update.insert("b".into(), Value::from("two"));
        root.update_attrs(update).unwrap();
        assert_eq!(root.attrs().unwrap().len(), 2);
        root.replace_attrs(&Attributes::new()).unwrap();
        assert!(root.attrs().unwrap().is_empty());
        assert_eq!(root.attr("a").unwrap(), None);
    }

    // ---- Copy / compare ----

    #[test]
    fn copy_into_produces_deep_equal_tree() {
        let src = root();
        src.set_attr("format_version", "0.1.0").unwrap();
        let raw = src.create_group("_raw").unwrap();
        raw.create_array("signal", &ArrayData::U8(b"0       ".to_vec()), &[8], &ArrayOptions::default())
            .unwrap();

        let dst_store: Arc<dyn StoreBackend> = Arc::new(InMemoryStore::new());
        let dst = Group::create_root(Arc::clone(&dst_store)).unwrap();
        src.copy_into(&dst).unwrap();
        assert!(src.deep_eq(&dst).unwrap());

        dst.group("_raw").unwrap().set_attr("extra", true).unwrap();
        assert_eq!(
            src.first_difference(&dst).unwrap().as_deref(),
            Some("/_raw: attributes differ")
        );
    }

    #[test]
    fn compare_detects_array_content() {
        let a = root();
        let b = root();
        a.create_array("x", &ArrayData::I16(vec![1, 2]), &[2], &ArrayOptions::default())
            .unwrap();
        b.create_array("x", &ArrayData::I16(vec![1, 3]), &[2], &ArrayOptions::default())
            .unwrap();
        assert_eq!(a.first_difference(&b).unwrap().as_deref(), Some("/x: data differs"));
    }

    #[test]
    fn tree_lists_nested_members() {
        let root = root();
        let rkns = root.create_group("rkns").unwrap();
        rkns.create_array("onset", &ArrayData::F64(vec![0.0; 3]), &[3], &ArrayOptions::default())
            .unwrap();
        root.create_group("history").unwrap();
        let tree = root.tree().unwrap();
        assert_eq!(tree, "/\n├── history\n└── rkns\n    └── onset (f64 [3])\n");
    }
}
