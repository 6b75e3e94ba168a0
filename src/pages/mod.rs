mod auth;
mod dashboard;
mod evaluation;
mod generate;
mod knowledge;
mod layout;
mod projects;
mod settings;
mod ui_automation;

pub use api_test::ApiTestPage;
pub use auth::{LoginPage, RegisterPage};
pub use dashboard::DashboardPage;
pub use evaluation::EvaluationPage;
pub use generate::GeneratePage;
pub use knowledge::KnowledgePage;
pub use layout::{RequireProject, RootAuthed};
pub use projects::ProjectsPage;
pub use settings::SettingsPage;
pub use ui_automation::UiAutomationPage;
