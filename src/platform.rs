extern crate alloc;
use crate::channel::{
    end_of_prompt_pattern,
    Category,
    ConfirmKind,
    PatternEntry,
    PatternTable,
};
use crate::driver::Context;
use crate::errors::OpsError;
use alloc::collections::VecDeque;
use core::time::Duration;
use once_cell::sync::OnceCell;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::{
    HashMap,
    HashSet,
};

const OPENSWITCH_PLATFORM_YAML: &str = include_str!("assets/openswitch.yaml");
const LINUX_HOST_PLATFORM_YAML: &str = include_str!("assets/linux_host.yaml");

/// Returns a `HashMap` wherein platform names are keys and the included yaml platform (asset) data
/// string is the value.
pub fn get_platforms() -> &'static HashMap<&'static str, &'static str> {
    static PLATFORMS: OnceCell<HashMap<&str, &str>> = OnceCell::new();

    PLATFORMS.get_or_init(|| {
        HashMap::from([
            ("openswitch", OPENSWITCH_PLATFORM_YAML),
            ("linux_host", LINUX_HOST_PLATFORM_YAML),
        ])
    })
}

const fn default_timeout_ops_seconds() -> u64 {
    crate::channel::constants::DEFAULT_TIMEOUT_OPS.as_secs()
}

fn default_pagination_response() -> String {
    String::from(crate::channel::constants::DEFAULT_PAGINATION_RESPONSE)
}

/// One shell context a platform offers: how to recognize its prompt and how to get in and out of
/// it from its parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContextDefinition {
    /// The context being described.
    pub context: Context,
    /// The context this one is entered from; the root context has none.
    #[serde(default)]
    pub parent: Option<Context>,
    /// Prompt patterns of the context.
    pub prompts: Vec<String>,
    /// Command entering this context from its parent.
    #[serde(default)]
    pub enter: String,
    /// Command leaving this context for its parent.
    #[serde(default)]
    pub exit: String,
}

/// A prompt answered with a fixed line whenever it shows up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoResponse {
    /// The prompt pattern.
    pub pattern: String,
    /// The line sent back.
    pub response: String,
}

/// `Definition` is the serde view of a platform yaml document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Definition {
    /// The type of the platform, for example `openswitch` or `linux_host`.
    pub platform_type: String,
    /// The context sessions settle in after login.
    pub default_context: Context,
    /// Default per command timeout in seconds.
    #[serde(default = "default_timeout_ops_seconds")]
    pub timeout_ops_seconds: u64,
    /// Login (username) prompt patterns.
    pub login_patterns: Vec<String>,
    /// Password prompt patterns.
    pub password_patterns: Vec<String>,
    /// Patterns of the device rejecting credentials.
    #[serde(default)]
    pub login_incorrect_patterns: Vec<String>,
    /// The contexts of the platform; exactly one has no parent.
    pub contexts: Vec<ContextDefinition>,
    /// Pagination marker patterns.
    #[serde(default)]
    pub pagination_patterns: Vec<String>,
    /// What is sent to get the next page.
    #[serde(default = "default_pagination_response")]
    pub pagination_response: String,
    /// "(yes/no)" style confirmation patterns.
    #[serde(default)]
    pub yes_no_patterns: Vec<String>,
    /// "[y/n]" style confirmation patterns.
    #[serde(default)]
    pub y_n_patterns: Vec<String>,
    /// Banners meaning the connection failed or was closed.
    #[serde(default)]
    pub connection_failure_patterns: Vec<String>,
    /// Prompts answered automatically.
    #[serde(default)]
    pub auto_responses: Vec<AutoResponse>,
    /// Check `$?` after commands finishing at a root context prompt.
    #[serde(default)]
    pub exit_status_check: bool,
}

/// `Platform` is a compiled `Definition`: the session pattern table used for both login and
/// command execution, the banner flush table, and the context graph.
#[derive(Debug, Clone)]
pub struct Platform {
    definition: Definition,
    root: Context,
    session_table: PatternTable,
    flush_table: PatternTable,
    graph: HashMap<Context, Vec<Context>>,
}

impl Platform {
    /// Returns an instance of `Platform` generated from the embedded platform `platform_name`.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::Platform` if the name is unknown or the platform fails to compile.
    pub fn new(platform_name: &str) -> Result<Self, OpsError> {
        let platforms = get_platforms();

        platforms.get(platform_name).map_or_else(
            || {
                Err(OpsError::Platform {
                    details: format!("unknown platform name '{platform_name}'"),
                })
            },
            |platform_str| Self::from_yaml(platform_str),
        )
    }

    /// Returns a `Platform` compiled from a yaml platform document.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::Platform` if the document does not deserialize or is inconsistent, and
    /// `OpsError::InvalidPatternTable` if one of its patterns is invalid.
    pub fn from_yaml(s: &str) -> Result<Self, OpsError> {
        let definition: Definition =
            serde_yaml::from_str(s).map_err(|err| OpsError::Platform {
                details: format!("failed deserializing platform definition, error: {err}"),
            })?;

        Self::from_definition(definition)
    }

    /// Returns a `Platform` compiled from `definition`.
    ///
    /// # Errors
    ///
    /// Returns `OpsError::Platform` if the definition is inconsistent, and
    /// `OpsError::InvalidPatternTable` if one of its patterns is invalid.
    pub fn from_definition(definition: Definition) -> Result<Self, OpsError> {
        let root = validate_contexts(&definition)?;

        let session_table = build_session_table(&definition)?;

        let flush_table = PatternTable::new(vec![
            PatternEntry::regex(
                "end-of-prompt",
                end_of_prompt_pattern().as_str(),
                Category::EndOfPrompt,
            )?,
            PatternEntry::eof(),
            PatternEntry::timeout(),
        ])?;

        let graph = build_context_graph(&definition);

        Ok(Self {
            definition,
            root,
            session_table,
            flush_table,
            graph,
        })
    }

    /// Returns the definition the platform was compiled from.
    #[must_use]
    pub const fn definition(&self) -> &Definition {
        &self.definition
    }

    /// Returns the platform type, ex: "openswitch".
    #[must_use]
    pub fn platform_type(&self) -> &str {
        &self.definition.platform_type
    }

    /// Returns the context the handshake lands in -- the context with no parent.
    #[must_use]
    pub const fn root_context(&self) -> Context {
        self.root
    }

    /// Returns the context sessions settle in after login.
    #[must_use]
    pub const fn default_context(&self) -> Context {
        self.definition.default_context
    }

    /// Returns the default per command timeout.
    #[must_use]
    pub const fn timeout_ops(&self) -> Duration {
        Duration::from_secs(self.definition.timeout_ops_seconds)
    }

    /// Indicates if `$?` should be checked after commands at a root context prompt.
    #[must_use]
    pub const fn exit_status_check(&self) -> bool {
        self.definition.exit_status_check
    }

    /// Returns what is sent to get the next page of output.
    #[must_use]
    pub fn pagination_response(&self) -> &str {
        &self.definition.pagination_response
    }

    /// Returns the table used for the login handshake and for command execution.
    #[must_use]
    pub const fn session_table(&self) -> &PatternTable {
        &self.session_table
    }

    /// Returns the table used to swallow trailing banner text.
    #[must_use]
    pub const fn flush_table(&self) -> &PatternTable {
        &self.flush_table
    }

    /// Indicates if the platform declares `context`.
    #[must_use]
    pub fn supports(
        &self,
        context: Context,
    ) -> bool {
        self.context(context).is_some()
    }

    /// Returns the definition of `context`, if the platform declares it.
    #[must_use]
    pub fn context(
        &self,
        context: Context,
    ) -> Option<&ContextDefinition> {
        self.definition
            .contexts
            .iter()
            .find(|definition| definition.context == context)
    }

    /// Returns the parent of `context`; `None` for the root or undeclared contexts.
    #[must_use]
    pub fn parent(
        &self,
        context: Context,
    ) -> Option<Context> {
        self.context(context).and_then(|definition| definition.parent)
    }

    /// Returns the shortest sequence of contexts leading from `from` to `to`, both included.
    /// `None` if either is undeclared.
    #[must_use]
    pub fn path(
        &self,
        from: Context,
        to: Context,
    ) -> Option<Vec<Context>> {
        if !self.supports(from) || !self.supports(to) {
            return None;
        }

        let mut queue = VecDeque::from([from]);
        let mut visited = HashSet::from([from]);
        let mut came_from: HashMap<Context, Context> = HashMap::new();

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut node = to;

                while let Some(prev) = came_from.get(&node) {
                    path.push(*prev);
                    node = *prev;
                }

                path.reverse();

                return Some(path);
            }

            for neighbor in self.graph.get(&current).into_iter().flatten() {
                if visited.insert(*neighbor) {
                    came_from.insert(*neighbor, current);
                    queue.push_back(*neighbor);
                }
            }
        }

        None
    }

    /// Returns the command moving a session one step from `from` to the adjacent context `to`.
    #[must_use]
    pub fn transition_command(
        &self,
        from: Context,
        to: Context,
    ) -> Option<&str> {
        if self.parent(to) == Some(from) {
            return self.context(to).map(|definition| definition.enter.as_str());
        }

        if self.parent(from) == Some(to) {
            return self.context(from).map(|definition| definition.exit.as_str());
        }

        None
    }
}

fn validate_contexts(definition: &Definition) -> Result<Context, OpsError> {
    let platform_type = &definition.platform_type;
    let declared: HashSet<Context> = definition.contexts.iter().map(|c| c.context).collect();

    if declared.len() != definition.contexts.len() {
        return Err(OpsError::Platform {
            details: format!("platform '{platform_type}' declares a context more than once"),
        });
    }

    let roots: Vec<Context> = definition
        .contexts
        .iter()
        .filter(|c| c.parent.is_none())
        .map(|c| c.context)
        .collect();

    let [root] = roots.as_slice() else {
        return Err(OpsError::Platform {
            details: format!(
                "platform '{platform_type}' must declare exactly one root context, found {}",
                roots.len()
            ),
        });
    };

    for context in &definition.contexts {
        if context.prompts.is_empty() {
            return Err(OpsError::Platform {
                details: format!(
                    "platform '{platform_type}' context {} has no prompt patterns",
                    context.context
                ),
            });
        }

        let Some(parent) = context.parent else {
            continue;
        };

        if !declared.contains(&parent) || parent == context.context {
            return Err(OpsError::Platform {
                details: format!(
                    "platform '{platform_type}' context {} has invalid parent {parent}",
                    context.context
                ),
            });
        }

        if context.enter.is_empty() || context.exit.is_empty() {
            return Err(OpsError::Platform {
                details: format!(
                    "platform '{platform_type}' context {} needs both enter and exit commands",
                    context.context
                ),
            });
        }
    }

    if !declared.contains(&definition.default_context) {
        return Err(OpsError::Platform {
            details: format!(
                "platform '{platform_type}' default context {} is not declared",
                definition.default_context
            ),
        });
    }

    Ok(*root)
}

/// Number of parent hops between `context` and the root; bounded by the number of contexts so a
/// parent cycle cannot loop forever.
fn depth(
    definition: &Definition,
    context: Context,
) -> usize {
    let mut depth = 0;
    let mut current = context;

    while depth < definition.contexts.len() {
        let Some(parent) = definition
            .contexts
            .iter()
            .find(|c| c.context == current)
            .and_then(|c| c.parent)
        else {
            break;
        };

        depth += 1;
        current = parent;
    }

    depth
}

fn push_entries(
    entries: &mut Vec<PatternEntry>,
    id: &str,
    patterns: &[String],
    category: &Category,
) -> Result<(), OpsError> {
    for (i, pattern) in patterns.iter().enumerate() {
        entries.push(PatternEntry::regex(
            &format!("{id}-{i}"),
            pattern,
            category.clone(),
        )?);
    }

    Ok(())
}

/// Builds the session table: credentials first, then prompts from the deepest context up so that
/// more specific prompts win ties, then the interactive prompts, failures and both sentinels.
fn build_session_table(definition: &Definition) -> Result<PatternTable, OpsError> {
    let mut entries = vec![];

    push_entries(
        &mut entries,
        "login",
        &definition.login_patterns,
        &Category::Login,
    )?;
    push_entries(
        &mut entries,
        "password",
        &definition.password_patterns,
        &Category::Password,
    )?;
    push_entries(
        &mut entries,
        "login-incorrect",
        &definition.login_incorrect_patterns,
        &Category::LoginIncorrect,
    )?;

    let mut contexts: Vec<&ContextDefinition> = definition.contexts.iter().collect();
    contexts.sort_by_key(|c| core::cmp::Reverse(depth(definition, c.context)));

    for context in contexts {
        push_entries(
            &mut entries,
            &format!("prompt-{}", context.context),
            &context.prompts,
            &Category::Prompt(context.context),
        )?;
    }

    push_entries(
        &mut entries,
        "confirm-yes-no",
        &definition.yes_no_patterns,
        &Category::Confirm(ConfirmKind::YesNo),
    )?;
    push_entries(
        &mut entries,
        "confirm-y-n",
        &definition.y_n_patterns,
        &Category::Confirm(ConfirmKind::YN),
    )?;
    push_entries(
        &mut entries,
        "pagination",
        &definition.pagination_patterns,
        &Category::Pagination,
    )?;

    for (i, auto_response) in definition.auto_responses.iter().enumerate() {
        entries.push(PatternEntry::regex(
            &format!("auto-response-{i}"),
            &auto_response.pattern,
            Category::AutoRespond(auto_response.response.clone()),
        )?);
    }

    push_entries(
        &mut entries,
        "connection-failure",
        &definition.connection_failure_patterns,
        &Category::ConnectionFailure,
    )?;

    entries.push(PatternEntry::eof());
    entries.push(PatternEntry::timeout());

    PatternTable::new(entries)
}

fn build_context_graph(definition: &Definition) -> HashMap<Context, Vec<Context>> {
    let mut graph: HashMap<Context, Vec<Context>> = HashMap::new();

    for context in &definition.contexts {
        graph.entry(context.context).or_default();

        let Some(parent) = context.parent else {
            continue;
        };

        graph.entry(context.context).or_default().push(parent);
        graph.entry(parent).or_default().push(context.context);
    }

    graph
}
