//! Versioned log of structural edits, replayed onto formulas when read.
//!
//! Committing an edit costs one log entry. A formula remembers the version
//! its tree was last brought up to date at; reading it folds every newer
//! entry over the tree and stores the result back.

use std::sync::Arc;

use gridflow_common::{Ast, SheetId, SimpleCellAddress};

use super::transform::{
    MoveCellsTransformer, RemoveSheetTransformer, RenameSheetTransformer, SpanTransformer,
    Transformer,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Transformation {
    Span(SpanTransformer),
    MoveCells(MoveCellsTransformer),
    RemoveSheet(RemoveSheetTransformer),
    RenameSheet(RenameSheetTransformer),
}

impl Transformation {
    pub fn transformer(&self) -> &dyn Transformer {
        match self {
            Transformation::Span(t) => t,
            Transformation::MoveCells(t) => t,
            Transformation::RemoveSheet(t) => t,
            Transformation::RenameSheet(t) => t,
        }
    }

    pub fn sheet(&self) -> SheetId {
        self.transformer().sheet()
    }

    pub fn is_irreversible(&self) -> bool {
        self.transformer().is_irreversible()
    }
}

impl From<SpanTransformer> for Transformation {
    fn from(t: SpanTransformer) -> Self {
        Transformation::Span(t)
    }
}

impl From<MoveCellsTransformer> for Transformation {
    fn from(t: MoveCellsTransformer) -> Self {
        Transformation::MoveCells(t)
    }
}

impl From<RemoveSheetTransformer> for Transformation {
    fn from(t: RemoveSheetTransformer) -> Self {
        Transformation::RemoveSheet(t)
    }
}

impl From<RenameSheetTransformer> for Transformation {
    fn from(t: RenameSheetTransformer) -> Self {
        Transformation::RenameSheet(t)
    }
}

/// A formula tree and position, current as of `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub ast: Arc<Ast>,
    pub address: SimpleCellAddress,
    pub version: u64,
}

#[derive(Debug, Default)]
pub struct LazyTransformService {
    version: u64,
    log: Vec<(u64, Transformation)>,
}

impl LazyTransformService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Append an edit and return the version it created.
    pub fn commit(&mut self, transformation: impl Into<Transformation>) -> u64 {
        self.version += 1;
        let transformation = transformation.into();
        #[cfg(feature = "tracing")]
        tracing::debug!(version = self.version, ?transformation, "commit transformation");
        self.log.push((self.version, transformation));
        self.version
    }

    /// Entries committed after `version`, oldest first.
    pub fn since(&self, version: u64) -> impl Iterator<Item = &Transformation> + '_ {
        let start = self.log.partition_point(|(v, _)| *v <= version);
        self.log[start..].iter().map(|(_, t)| t)
    }

    pub fn is_current(&self, version: u64) -> bool {
        version >= self.version
    }

    /// Bring a formula up to date. Unchanged trees keep their allocation.
    pub fn resolve(&self, ast: &Arc<Ast>, address: SimpleCellAddress, version: u64) -> Resolved {
        let mut current = Arc::clone(ast);
        let mut address = address;
        for transformation in self.since(version) {
            let (new_ast, new_address) = transformation
                .transformer()
                .transform_single_ast(&current, address);
            if let Some(new_ast) = new_ast {
                current = Arc::new(new_ast);
            }
            address = new_address;
        }
        Resolved {
            ast: current,
            address,
            version: self.version,
        }
    }

    /// Number of entries kept.
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Drop entries every formula has already absorbed.
    pub fn compact(&mut self, oldest_pending: u64) {
        let keep_from = self.log.partition_point(|(v, _)| *v <= oldest_pending);
        if keep_from > 0 {
            self.log.drain(..keep_from);
        }
    }
}
