//! Named connection registry.
//!
//! Connections are numbered from 1 in the order they are opened and may
//! also carry an alias. Exactly one open connection (or none) is current.
//! Closing a connection frees its alias but never reuses its index; only
//! [`ConnectionRegistry::drain`] restarts numbering.
//!
//! The registry is generic over the stored connection so lookup rules can be
//! tested without a database.

use crate::error::{DbError, DbResult};
use std::collections::HashMap;

#[derive(Debug)]
struct Slot<C> {
    alias: Option<String>,
    conn: C,
}

#[derive(Debug)]
pub struct ConnectionRegistry<C> {
    /// `slots[i]` holds index `i + 1`; `None` once closed.
    slots: Vec<Option<Slot<C>>>,
    aliases: HashMap<String, usize>,
    current: Option<usize>,
}

/// One open registry entry, as seen by listing.
#[derive(Debug)]
pub struct RegistryEntry<'a, C> {
    pub index: usize,
    pub alias: Option<&'a str>,
    pub conn: &'a C,
    pub current: bool,
}

impl<C> ConnectionRegistry<C> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            aliases: HashMap::new(),
            current: None,
        }
    }

    /// Store a connection and make it current. Returns its index.
    pub fn register(&mut self, conn: C, alias: Option<&str>) -> DbResult<usize> {
        if let Some(alias) = alias {
            if self.aliases.contains_key(alias) {
                return Err(DbError::alias_in_use(alias));
            }
        }
        self.slots.push(Some(Slot {
            alias: alias.map(str::to_string),
            conn,
        }));
        let index = self.slots.len();
        if let Some(alias) = alias {
            self.aliases.insert(alias.to_string(), index);
        }
        self.current = Some(index);
        Ok(index)
    }

    /// Check up front whether an alias could be registered.
    pub fn ensure_alias_free(&self, alias: Option<&str>) -> DbResult<()> {
        match alias {
            Some(a) if self.aliases.contains_key(a) => Err(DbError::alias_in_use(a)),
            _ => Ok(()),
        }
    }

    /// Resolve an alias or index string to an open index.
    ///
    /// Aliases win over indices, so an alias of `"2"` shadows index 2.
    /// `None` means the current connection.
    pub fn resolve(&self, target: Option<&str>) -> DbResult<usize> {
        let Some(target) = target else {
            return self.current.ok_or(DbError::NoActiveConnection);
        };
        if let Some(&index) = self.aliases.get(target) {
            return Ok(index);
        }
        match target.trim().parse::<usize>() {
            Ok(index) if self.is_open(index) => Ok(index),
            _ => Err(DbError::connection_not_found(target)),
        }
    }

    /// Make `target` current. Returns the previously current index.
    pub fn switch(&mut self, target: &str) -> DbResult<Option<usize>> {
        let index = self.resolve(Some(target))?;
        Ok(self.current.replace(index))
    }

    pub fn get(&self, target: Option<&str>) -> DbResult<&C> {
        let index = self.resolve(target)?;
        self.slot(index)
            .map(|s| &s.conn)
            .ok_or_else(|| DbError::internal(format!("Registry slot {index} is empty")))
    }

    pub fn get_mut(&mut self, target: Option<&str>) -> DbResult<&mut C> {
        let index = self.resolve(target)?;
        self.slots
            .get_mut(index - 1)
            .and_then(Option::as_mut)
            .map(|s| &mut s.conn)
            .ok_or_else(|| DbError::internal(format!("Registry slot {index} is empty")))
    }

    /// Take a connection out of the registry so the caller can close it.
    ///
    /// Clears the current connection if it was the one removed.
    pub fn remove(&mut self, target: Option<&str>) -> DbResult<(usize, C)> {
        let index = self.resolve(target)?;
        let slot = self
            .slots
            .get_mut(index - 1)
            .and_then(Option::take)
            .ok_or_else(|| DbError::internal(format!("Registry slot {index} is empty")))?;
        if let Some(alias) = &slot.alias {
            self.aliases.remove(alias);
        }
        if self.current == Some(index) {
            self.current = None;
        }
        Ok((index, slot.conn))
    }

    /// Take every open connection and restart numbering at 1.
    pub fn drain(&mut self) -> Vec<(usize, C)> {
        self.aliases.clear();
        self.current = None;
        std::mem::take(&mut self.slots)
            .into_iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|s| (i + 1, s.conn)))
            .collect()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn alias_of(&self, index: usize) -> Option<&str> {
        self.slot(index).and_then(|s| s.alias.as_deref())
    }

    /// Open connections in index order.
    pub fn iter(&self) -> impl Iterator<Item = RegistryEntry<'_, C>> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref().map(|s| RegistryEntry {
                index: i + 1,
                alias: s.alias.as_deref(),
                conn: &s.conn,
                current: self.current == Some(i + 1),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_open(&self, index: usize) -> bool {
        self.slot(index).is_some()
    }

    fn slot(&self, index: usize) -> Option<&Slot<C>> {
        index
            .checked_sub(1)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
