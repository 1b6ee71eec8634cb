pub mod chat_requests;
pub mod files;
pub mod login;
pub mod notifications;

pub use chat_requests::ChatRequestsView;
pub use files::FilesView;
pub use login::LoginView;
pub use notifications::NotificationsView;
