pub(crate) mod pagination;
pub(crate) mod toast;
pub(crate) mod ui;
