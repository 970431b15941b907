pub mod error;
pub use error::{AppError, ValidationError};

pub mod config;
pub use config::{Config, EngineConfig};

pub mod fs {
    pub mod path_utils;

    pub mod object_info;
    pub use object_info::{DirectoryEntry, SortMode};

    pub mod primitives;
    pub use primitives::{FileSystem, LocalFileSystem};

    pub mod dir_scanner;
    pub use dir_scanner::DirectoryLister;
}

pub mod model {
    pub mod selection;
    pub use selection::{Press, Selection, SelectionMode, TapOutcome};

    pub mod nav_context;
    pub use nav_context::{NavContext, RefreshSignal};
}

pub mod operators {
    pub mod operation;
    pub use operation::{
        BatchReport, DeleteReport, ItemOutcome, OperationKind, OperationOutcome, OperationRequest,
    };

    pub mod file_operation_engine;
    pub use file_operation_engine::FileOperationEngine;
}

pub mod session;
pub use session::FileManager;

pub mod logging;
pub use logging::Logger;

pub use trackr::{Manifest, ManifestError};
