pub mod clock;
pub mod credentials;
pub mod domain;
pub mod ids;
pub mod memory;
pub mod ports;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use clock::{ManualClock, SystemClock};
pub use domain::{
    Application, BlobRef, Category, DocumentSlot, Email, IdKind, NewApplication, NewCategory,
    NewPost, NewStaffAccount, NewSupplier, Page, PostFilter, ProcurementPost,
    ProcurementStaffAccount, StaffIdentity, StatusUpdate, SupplierSummary, SupplierView,
    UploadedFile,
};
pub use ids::{random_numeric_code, IdGenerator};
pub use ports::{
    BlobStore, Clock, CompensationLog, CounterStore, DocumentStore, NotificationService,
    PasswordHasher, PortError, PortResult, ResetCodeStore,
};
pub use workflow::{
    FieldError, Ports, ProcurementWorkflow, WorkflowError, WorkflowResult, WorkflowSettings,
};
