#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::nursery)]
#![deny(clippy::pedantic)]
#![deny(clippy::perf)]
#![deny(clippy::style)]
#![deny(clippy::suspicious)]
#![deny(missing_docs)]
#![warn(clippy::multiple_crate_versions)]
// restriction is wild, but some good things for consistency in there, rather would allow things
// explicitly so any new lints pop up and annoy if they get added and then can decide to keep or
// ditch them!
#![warn(clippy::restriction)]
#![allow(clippy::implicit_return)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::question_mark_used)]
#![allow(clippy::separated_literal_suffix)]
#![allow(clippy::missing_inline_in_public_items)]
#![allow(clippy::exhaustive_enums)]
#![allow(clippy::exhaustive_structs)]
#![allow(clippy::self_named_module_files)]
#![allow(clippy::multiple_inherent_impl)]
#![allow(clippy::partial_pub_fields)]
#![allow(clippy::default_numeric_fallback)]
#![allow(clippy::blanket_clippy_restriction_lints)]
#![allow(clippy::std_instead_of_core)]
#![allow(clippy::multiple_unsafe_ops_per_block)]
#![allow(clippy::single_char_lifetime_names)]
#![allow(clippy::missing_trait_methods)]
#![allow(clippy::as_conversions)]
#![allow(clippy::shadow_unrelated)]
#![allow(clippy::unwrap_in_result)]
#![allow(clippy::pub_use)]
#![allow(clippy::arithmetic_side_effects)]

//! opsexpect drives interactive sessions on network switches and linux hosts: it logs in over a
//! pty or socket, runs commands to completion against a table of expected patterns, classifies
//! their output and moves the device between its shell contexts.

/// Channel is the object that consumes from and writes to opsexpect transports, and matches what
/// it reads against pattern tables. The channel should generally only be interacted with by the
/// session.
pub mod channel;

/// Classifies command output into an exit status and an error category.
pub mod classifier;

/// The session "driver", the primary object users work with.
pub mod driver {
    /// The session builder package, ya know, for building sessions.
    pub mod builder;

    /// Shell contexts and moving between them.
    pub mod context;

    /// Command execution.
    pub mod execute;

    mod handshake;

    /// The session itself.
    pub mod session;

    /// The session builder re-exported for convenience.
    pub use crate::driver::builder::Builder;

    /// The shell context re-exported for convenience.
    pub use crate::driver::context::Context;

    /// The per command options re-exported for convenience.
    pub use crate::driver::execute::Options;

    /// The session re-exported for convenience.
    pub use crate::driver::session::{
        Credentials,
        Session,
    };
}

/// Opsexpect errors.
pub mod errors;

/// Module responsible for dealing with "platform" things -- meaning taking a yaml platform
/// definition and compiling its pattern tables and context graph.
pub mod platform;

/// Module containing the opsexpect "response" objects -- that is, objects that are returned from
/// command execution.
pub mod response;

/// Append only, thread safe transcript of session traffic.
pub mod session_log;

/// Transport module holds the base transport and any transport implementations.
pub mod transport {
    /// Base transport module providing trait that all transports must implement.
    pub mod base;

    /// An in memory transport replaying scripted device behavior.
    pub mod scripted;

    /// A plain tcp socket transport.
    pub mod socket;

    /// The "system" transport, spawning a program (docker, telnet, ...) on a pty.
    pub mod system;

    /// Transport selection re-exported for convenience.
    pub use crate::transport::base::new_transport;
}

/// Opsexpect utilities.
pub mod util {
    /// Child processes on a pty.
    pub(crate) mod pty;
}
