//! Functional tests against mock MagicQuill backends

mod checklist_test;
mod load_test;
mod support;
