//! Browser automation module
//!
//! Headless Chromium control through ChromiumOxide: process lifecycle,
//! navigation under a hard deadline, and the axe-core audit.

pub mod audit;
pub mod controller;
pub mod navigation;
pub mod session;

pub use audit::{AuditReport, AuditRunner, AxeLocation, AxeSource, Impact, RuleResult};
pub use controller::{BrowserConfig, BrowserController};
pub use navigation::{NavigationOptions, NavigationResult, PageNavigator, UrlValidator, WaitUntil};
pub use session::{ChromiumEngine, ChromiumSession};
