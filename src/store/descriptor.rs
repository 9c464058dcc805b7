//! Entity descriptors
//!
//! A descriptor knows, for one root type, which other root types it points
//! to (imported relationships) and how to turn a record write into a bound
//! statement.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::batch::{RecordWrite, RootType, WriteKind};

use super::backend::BoundStatement;

/// Per root type metadata consumed by the batching engine
pub trait EntityDescriptor: Send + Sync {
    /// Stable identity key of the root type
    fn root_type(&self) -> &RootType;

    /// Root types this type imports (many-to-one style associations)
    fn imported(&self) -> &[RootType];

    /// Emit the statement for a pending record write
    fn bind(&self, record: &RecordWrite) -> BoundStatement;
}

/// Descriptor for a record stored in a single table keyed by one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub root: RootType,
    pub table: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default)]
    pub imported: Vec<RootType>,
}

fn default_id_column() -> String {
    "id".to_string()
}

impl TableDescriptor {
    pub fn new(root: impl Into<RootType>, table: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            table: table.into(),
            id_column: default_id_column(),
            imported: Vec::new(),
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Declare an imported relationship to `target`
    pub fn imports(mut self, target: impl Into<RootType>) -> Self {
        self.imported.push(target.into());
        self
    }

    fn bind_insert(&self, record: &RecordWrite) -> BoundStatement {
        let mut columns = Vec::with_capacity(record.values.len() + 1);
        let mut params = Vec::with_capacity(record.values.len() + 1);
        if let Some(id) = &record.id {
            columns.push(self.id_column.as_str());
            params.push(id.clone());
        }
        for (column, value) in &record.values {
            if column == &self.id_column {
                continue;
            }
            columns.push(column.as_str());
            params.push(value.clone());
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "insert into {} ({}) values ({})",
            self.table,
            columns.join(", "),
            placeholders
        );
        BoundStatement::new(sql, params)
    }

    fn bind_update(&self, record: &RecordWrite) -> BoundStatement {
        let mut assignments = Vec::with_capacity(record.values.len());
        let mut params = Vec::with_capacity(record.values.len() + 1);
        for (column, value) in &record.values {
            if column == &self.id_column {
                continue;
            }
            assignments.push(format!("{} = ?", column));
            params.push(value.clone());
        }
        params.push(record.id.clone().unwrap_or(Value::Null));
        let sql = format!(
            "update {} set {} where {} = ?",
            self.table,
            assignments.join(", "),
            self.id_column
        );
        BoundStatement::new(sql, params)
    }

    fn bind_delete(&self, record: &RecordWrite) -> BoundStatement {
        let sql = format!("delete from {} where {} = ?", self.table, self.id_column);
        BoundStatement::new(sql, vec![record.id.clone().unwrap_or(Value::Null)])
    }
}

impl EntityDescriptor for TableDescriptor {
    fn root_type(&self) -> &RootType {
        &self.root
    }

    fn imported(&self) -> &[RootType] {
        &self.imported
    }

    fn bind(&self, record: &RecordWrite) -> BoundStatement {
        match record.kind {
            WriteKind::Insert => self.bind_insert(record),
            WriteKind::Update => self.bind_update(record),
            WriteKind::Delete => self.bind_delete(record),
        }
    }
}

/// Lookup from root type identity to descriptor.
#[derive(Clone, Default)]
pub struct DescriptorRegistry {
    descriptors: HashMap<RootType, Arc<dyn EntityDescriptor>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any earlier one for the same root type.
    pub fn register(&mut self, descriptor: impl EntityDescriptor + 'static) {
        let root = descriptor.root_type().clone();
        self.descriptors.insert(root, Arc::new(descriptor));
    }

    pub fn get(&self, root: &RootType) -> Option<&Arc<dyn EntityDescriptor>> {
        self.descriptors.get(root)
    }

    pub fn contains(&self, root: &RootType) -> bool {
        self.descriptors.contains_key(root)
    }

    /// Imported relationships of `root`; empty for unknown types.
    pub fn imported(&self, root: &RootType) -> &[RootType] {
        self.descriptors
            .get(root)
            .map(|d| d.imported())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl std::fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut roots: Vec<_> = self.descriptors.keys().collect();
        roots.sort();
        f.debug_struct("DescriptorRegistry")
            .field("roots", &roots)
            .finish()
    }
}

impl FromIterator<TableDescriptor> for DescriptorRegistry {
    fn from_iter<I: IntoIterator<Item = TableDescriptor>>(iter: I) -> Self {
        let mut registry = Self::new();
        for descriptor in iter {
            registry.register(descriptor);
        }
        registry
    }
}
