//! # Repo Readiness
//!
//! Audits git repositories against the size and shape limits of a managed
//! hosting platform before migration.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐
//! │  Resolve  │──▶│   Acquire   │──▶│  Collect  │──▶│ Evaluate │──▶│  Report  │
//! │ team/list │   │ clone cache │   │ git-sizer │   │  rules   │   │ JSON+txt │
//! └───────────┘   └─────────────┘   └───────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! readiness analyze --team platform --org acme
//! readiness analyze --repos web api --base-path ~/repos
//! readiness render repo_analysis.json
//! readiness org-stats --org acme
//! readiness org-summary --org acme --skip-forks
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | Local clone layout |
//! | [`acquire`] | Idempotent cloning |
//! | [`collect`] | `git-sizer` invocation and parsing |
//! | [`rules`] | Migration limit table and evaluation |
//! | [`aggregate`] | Pipeline driver |
//! | [`report`] | Persistence and rendering |
//! | [`resolve`] | Team / repository list resolution |
//! | [`audit`] | The `analyze` command |
//! | [`org_stats`] | Org-wide `gh repo-stats` report |
//! | [`org_summary`] | Org inventory via the GraphQL API |

pub mod acquire;
pub mod aggregate;
pub mod audit;
pub mod collect;
pub mod config;
pub mod error;
pub mod models;
pub mod org_stats;
pub mod org_summary;
pub mod process;
pub mod progress;
pub mod report;
pub mod resolve;
pub mod rules;
pub mod store;
