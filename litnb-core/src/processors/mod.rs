//! Built-in pipeline stages.
//!
//! | name                | effect                                            |
//! |---------------------|---------------------------------------------------|
//! | `populate_language` | records each code cell's language                 |
//! | `insert_warning`    | autogenerated-file banner after the first cell    |
//! | `frontmatter`       | resolves front matter, provides `Frontmatter`     |
//! | `add_show_docs`     | documentation cells, provides `HasDocs`           |
//! | `clean_show_doc`    | renders documentation cells output-only           |
//! | `hide`              | clears `hide` cells                               |
//! | `hide_line`         | drops `hide_line` lines                           |
//! | `rm_export`         | clears exported source                            |
//!
//! The execution stage lives in `litnb-runtime`.

mod cleanup;
mod frontmatter;
mod language;
mod show_docs;

pub use cleanup::{
    CleanShowDoc, Hide, HideLine, InsertWarning, RmExport, HIDDEN_KEYS, WARNING_BANNER,
};
pub use frontmatter::FrontmatterStage;
pub use language::{magic_language, PopulateLanguage};
pub use show_docs::{show_doc_source, wants_doc, AddShowDocs};
