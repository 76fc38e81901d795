use askama::Template;

pub const PAGE_TITLE: &str = "リスト作成ツール";

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage<'a> {
    pub title: &'a str,
    /// Account whose list was just created, shown once after the callback.
    pub completed_for: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorView<'a> {
    pub status: u16,
    pub message: &'a str,
    pub detail: Option<&'a str>,
}
