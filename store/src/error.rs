use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("no active undo frame")]
    NoUndoFrame,

    #[error("squash needs two undo frames, have {0}")]
    NothingToSquash(usize),
}
