//! Scripting contexts and the active-context slot.
//!
//! The host owns one [`MainContext`]. Every plugin owns one
//! [`InterpreterContext`], an isolated Lua state created while the main
//! context is active. Code that touches a plugin's Lua state must hold a
//! [`ContextGuard`] obtained from [`InterpreterContext::enter`]; dropping the
//! guard swaps the previously active context back in.
//!
//! Exactly one context is active at a time. Live guards form a stack and the
//! active context is the most recent one still entered, so guards may be
//! dropped in any order. The slot uses `Cell`, so none of these types are
//! `Sync`: callers serialize access themselves.

use std::cell::{Cell, RefCell};

use mlua::{Lua, LuaOptions, StdLib};

use hookbridge_core::{BridgeConfig, BridgeError, BridgeResult};

/// Identifier of a scripting context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// The host's main context.
    pub const MAIN: ContextId = ContextId(0);

    /// Get the raw ID.
    pub fn id(&self) -> u64 {
        self.0
    }

    /// Whether this is the main context.
    pub fn is_main(&self) -> bool {
        *self == Self::MAIN
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_main() {
            write!(f, "main")
        } else {
            write!(f, "sub#{}", self.0)
        }
    }
}

fn new_state() -> BridgeResult<Lua> {
    Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default()).map_err(|e| {
        BridgeError::ContextCreation {
            message: e.to_string(),
        }
    })
}

/// The host's own scripting context plus the process-wide active slot.
pub struct MainContext {
    /// The host's Lua state.
    lua: Lua,

    /// Context currently swapped in.
    active: Cell<ContextId>,

    /// Entered contexts, oldest first, keyed by guard token.
    entered: RefCell<Vec<(u64, ContextId)>>,

    /// Next guard token.
    next_token: Cell<u64>,

    /// Next sub-context ID.
    next_id: Cell<u64>,

    /// Number of swaps performed so far.
    swaps: Cell<u64>,

    /// Sub-contexts created and not yet closed.
    live: Cell<usize>,
}

impl MainContext {
    /// Create the main context. It starts out active.
    pub fn new() -> BridgeResult<Self> {
        Ok(Self {
            lua: new_state()?,
            active: Cell::new(ContextId::MAIN),
            entered: RefCell::new(Vec::new()),
            next_token: Cell::new(0),
            next_id: Cell::new(1),
            swaps: Cell::new(0),
            live: Cell::new(0),
        })
    }

    /// The context currently swapped in.
    pub fn active(&self) -> ContextId {
        self.active.get()
    }

    /// Whether the main context is the active one.
    pub fn is_main_active(&self) -> bool {
        self.active().is_main()
    }

    /// Total number of context swaps performed.
    pub fn swap_count(&self) -> u64 {
        self.swaps.get()
    }

    /// Number of plugin sub-contexts currently alive.
    pub fn live_sub_contexts(&self) -> usize {
        self.live.get()
    }

    /// The host's Lua state, available only while the main context is active.
    pub fn lua(&self) -> BridgeResult<&Lua> {
        if self.is_main_active() {
            Ok(&self.lua)
        } else {
            Err(BridgeError::ContextBusy)
        }
    }

    /// Record `to` as entered and make it active.
    fn push(&self, to: ContextId) -> u64 {
        let token = self.next_token.get();
        self.next_token.set(token + 1);
        self.entered.borrow_mut().push((token, to));
        self.sync();
        token
    }

    /// Forget the entry for `token` and activate whatever is now on top.
    fn pop(&self, token: u64) {
        self.entered.borrow_mut().retain(|(t, _)| *t != token);
        self.sync();
    }

    fn sync(&self) {
        let to = self
            .entered
            .borrow()
            .last()
            .map_or(ContextId::MAIN, |(_, id)| *id);
        let from = self.active.get();
        if from != to {
            self.active.set(to);
            self.swaps.set(self.swaps.get() + 1);
            tracing::trace!(%from, %to, "context swap");
        }
    }

    fn allocate(&self) -> ContextId {
        let id = ContextId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.live.set(self.live.get() + 1);
        id
    }

    fn release(&self) {
        self.live.set(self.live.get().saturating_sub(1));
    }
}

impl std::fmt::Debug for MainContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainContext")
            .field("active", &self.active.get())
            .field("swaps", &self.swaps.get())
            .field("live", &self.live.get())
            .finish_non_exhaustive()
    }
}

/// An isolated Lua state owned by one plugin.
pub struct InterpreterContext<'h> {
    main: &'h MainContext,
    id: ContextId,
    // Field order matters: `lua` is closed before `closing` drops.
    lua: Lua,
    closing: MainScope<'h>,
}

/// Keeps the main context entered while a sub-context's Lua state closes.
struct MainScope<'h> {
    main: &'h MainContext,
    token: Cell<Option<u64>>,
}

impl Drop for MainScope<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.main.pop(token);
        }
    }
}

impl<'h> InterpreterContext<'h> {
    /// Acquire a new sub-context. The main context must be active.
    pub fn new(main: &'h MainContext, config: &BridgeConfig) -> BridgeResult<Self> {
        if !main.is_main_active() {
            return Err(BridgeError::ContextBusy);
        }

        let lua = new_state()?;
        if config.memory_limit > 0 {
            lua.set_memory_limit(config.memory_limit)
                .map_err(|e| BridgeError::ContextCreation {
                    message: format!("Failed to set memory limit: {e}"),
                })?;
        }

        let id = main.allocate();
        tracing::debug!(context = %id, "created plugin sub-context");

        Ok(Self {
            main,
            id,
            lua,
            closing: MainScope {
                main,
                token: Cell::new(None),
            },
        })
    }

    /// This context's ID.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The main context this one was created from.
    pub fn main(&self) -> &'h MainContext {
        self.main
    }

    /// Whether this context is currently swapped in.
    pub fn is_active(&self) -> bool {
        self.main.active() == self.id
    }

    /// Swap this context in.
    ///
    /// If it is already active the returned guard performs no swap, in
    /// either direction.
    pub fn enter(&self) -> ContextGuard<'_> {
        let token = if self.is_active() {
            None
        } else {
            Some(self.main.push(self.id))
        };

        ContextGuard {
            main: self.main,
            lua: &self.lua,
            id: self.id,
            token,
        }
    }
}

impl Drop for InterpreterContext<'_> {
    fn drop(&mut self) {
        // The Lua state is closed right after this, with the main context
        // active; `closing` then restores whatever was active before.
        self.closing.token.set(Some(self.main.push(ContextId::MAIN)));
        self.main.release();
        tracing::debug!(context = %self.id, "closing plugin sub-context");
    }
}

impl std::fmt::Debug for InterpreterContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterContext")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Proof that a sub-context is active.
///
/// Leaving happens on [`leave`](Self::leave) or on drop, whichever comes first.
#[must_use = "dropping the guard leaves the context immediately"]
pub struct ContextGuard<'c> {
    main: &'c MainContext,
    lua: &'c Lua,
    id: ContextId,
    token: Option<u64>,
}

impl ContextGuard<'_> {
    /// The entered Lua state.
    pub fn lua(&self) -> &Lua {
        self.lua
    }

    /// ID of the entered context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Whether entering actually swapped contexts.
    pub fn swapped(&self) -> bool {
        self.token.is_some()
    }

    /// Leave the context, activating the most recent one still entered.
    pub fn leave(self) {
        drop(self);
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.main.pop(token);
        }
    }
}
