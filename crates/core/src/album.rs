use crate::catalog::{AlbumDescriptor, AlbumId, AlbumRecord, Catalog, CatalogError};
use crate::error::SyncError;
use crate::identity::{IdentityEngine, Namespace};
use crate::metadata::now_local;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_ALBUM_NAME_MAX_LEN: usize = 50;

/// Run-local view of the catalog's albums, keyed by (name, parent).
/// Loaded once; creations made through the resolver keep it current.
#[derive(Debug, Default)]
pub struct AlbumIndex {
    by_key: HashMap<(String, Option<AlbumId>), AlbumId>,
    albums: BTreeMap<AlbumId, AlbumDescriptor>,
}

impl AlbumIndex {
    pub fn load(catalog: &dyn Catalog) -> Result<Self, SyncError> {
        let albums = catalog.load_albums()?;
        debug!("album index loaded with {} album(s)", albums.len());
        Ok(albums.into_iter().collect())
    }

    pub fn lookup(&self, name: &str, parent: Option<AlbumId>) -> Option<AlbumId> {
        self.by_key.get(&(name.to_string(), parent)).copied()
    }

    pub fn get(&self, id: AlbumId) -> Option<&AlbumDescriptor> {
        self.albums.get(&id)
    }

    pub fn insert(&mut self, album: AlbumDescriptor) {
        self.by_key
            .insert((album.name.clone(), album.parent), album.id);
        self.albums.insert(album.id, album);
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    /// Album path from the root down to `id`.
    pub fn path_of(&self, id: AlbumId) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(album) = self.albums.get(&current) else {
                break;
            };
            names.push(album.name.clone());
            cursor = album.parent;
            if names.len() > self.albums.len() {
                break;
            }
        }
        names.reverse();
        names
    }

    fn sibling_groups(&self) -> Vec<Vec<AlbumId>> {
        let mut groups: BTreeMap<Option<AlbumId>, Vec<AlbumId>> = BTreeMap::new();
        for album in self.albums.values() {
            groups.entry(album.parent).or_default().push(album.id);
        }
        groups.into_values().filter(|ids| ids.len() > 1).collect()
    }

    fn rekey(&mut self, old: AlbumId, new: AlbumId) {
        let Some(mut album) = self.albums.remove(&old) else {
            return;
        };
        album.id = new;
        self.by_key.insert((album.name.clone(), album.parent), new);

        let children: Vec<AlbumId> = self
            .albums
            .values()
            .filter(|a| a.parent == Some(old))
            .map(|a| a.id)
            .collect();
        for child in children {
            if let Some(entry) = self.albums.get_mut(&child) {
                self.by_key.remove(&(entry.name.clone(), Some(old)));
                entry.parent = Some(new);
                self.by_key.insert((entry.name.clone(), Some(new)), child);
            }
        }
        self.albums.insert(new, album);
    }
}

impl FromIterator<AlbumDescriptor> for AlbumIndex {
    fn from_iter<T: IntoIterator<Item = AlbumDescriptor>>(iter: T) -> Self {
        let mut index = AlbumIndex::default();
        for album in iter {
            index.insert(album);
        }
        index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationPolicy {
    AutoCreate,
    LookupOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(AlbumId),
    /// Lookup-only miss below an existing ancestor.
    Partial {
        deepest: AlbumId,
        missing: Vec<String>,
    },
    /// Nothing matched, not even the first segment.
    Unmatched,
}

impl Resolution {
    pub fn album_id(&self) -> Option<AlbumId> {
        match self {
            Resolution::Resolved(id) => Some(*id),
            Resolution::Partial { deepest, .. } => Some(*deepest),
            Resolution::Unmatched => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlbumSettings {
    pub name_max_len: usize,
    pub public: bool,
}

impl Default for AlbumSettings {
    fn default() -> Self {
        Self {
            name_max_len: DEFAULT_ALBUM_NAME_MAX_LEN,
            public: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct SortOutcome {
    pub moved: usize,
    pub failures: Vec<SyncError>,
}

pub struct AlbumResolver<'a> {
    index: &'a mut AlbumIndex,
    identity: &'a mut IdentityEngine,
    catalog: &'a mut dyn Catalog,
    settings: AlbumSettings,
}

impl<'a> AlbumResolver<'a> {
    pub fn new(
        index: &'a mut AlbumIndex,
        identity: &'a mut IdentityEngine,
        catalog: &'a mut dyn Catalog,
        settings: AlbumSettings,
    ) -> Self {
        Self {
            index,
            identity,
            catalog,
            settings,
        }
    }

    pub fn resolve(
        &mut self,
        segments: &[String],
        policy: CreationPolicy,
    ) -> Result<Resolution, SyncError> {
        let mut parent: Option<AlbumId> = None;

        for (depth, segment) in segments.iter().enumerate() {
            let name = album_title(segment, self.settings.name_max_len);
            if let Some(id) = self.index.lookup(&name, parent) {
                parent = Some(id);
                continue;
            }
            match policy {
                CreationPolicy::AutoCreate => {
                    parent = Some(self.create(name, parent)?);
                }
                CreationPolicy::LookupOnly => {
                    return Ok(match parent {
                        Some(deepest) => Resolution::Partial {
                            deepest,
                            missing: segments[depth..].to_vec(),
                        },
                        None => Resolution::Unmatched,
                    });
                }
            }
        }

        Ok(parent.map_or(Resolution::Unmatched, Resolution::Resolved))
    }

    fn create(&mut self, name: String, parent: Option<AlbumId>) -> Result<AlbumId, SyncError> {
        let id = self.fresh_id()?;
        let album = AlbumDescriptor { id, name, parent };
        let record = AlbumRecord::new(&album, self.settings.public, now_local());
        self.catalog.create_album(record)?;
        info!(
            "created album '{}' ({}) under {}",
            album.name,
            album.id,
            parent.map_or_else(|| "root".to_string(), |p| p.to_string())
        );
        self.index.insert(album);
        Ok(id)
    }

    fn fresh_id(&mut self) -> Result<AlbumId, SyncError> {
        let catalog = &*self.catalog;
        let token = self.identity.get_unique(Namespace::Album, |token| {
            let id = parse_album_id(token)?;
            Ok(catalog.album_id_exists(id)?)
        })?;
        parse_album_id(&token)
    }

    /// Album ids double as display order, so siblings are put in name order
    /// by handing the sorted names the sorted ids. Every move goes through a
    /// temporary id first so no two siblings ever share one. A group is
    /// reordered completely or left as it was.
    pub fn sort_by_name(&mut self) -> Result<SortOutcome, SyncError> {
        let mut outcome = SortOutcome::default();

        for group in self.index.sibling_groups() {
            let moves = self.name_order_moves(&group);
            if moves.is_empty() {
                continue;
            }
            match self.reorder_group(&moves)? {
                None => outcome.moved += moves.len(),
                Some(failure) => {
                    warn!("album group left in its previous order: {}", failure);
                    outcome.failures.push(failure);
                }
            }
        }

        debug!(
            "album sort moved {} album(s), {} failure(s)",
            outcome.moved,
            outcome.failures.len()
        );
        Ok(outcome)
    }

    /// (current, target) pairs for albums not already on their name-order id.
    fn name_order_moves(&self, group: &[AlbumId]) -> Vec<(AlbumId, AlbumId)> {
        let mut ids = group.to_vec();
        ids.sort();
        let mut by_name: Vec<(String, AlbumId)> = group
            .iter()
            .filter_map(|id| self.index.get(*id).map(|a| (a.name.clone(), a.id)))
            .collect();
        by_name.sort();

        by_name
            .into_iter()
            .zip(ids)
            .filter(|((_, current), target)| current != target)
            .map(|((_, current), target)| (current, target))
            .collect()
    }

    /// Applies `moves` or rolls the group back. Only fatal errors are
    /// returned as `Err`; a recovered failure comes back as `Some`.
    fn reorder_group(
        &mut self,
        moves: &[(AlbumId, AlbumId)],
    ) -> Result<Option<SyncError>, SyncError> {
        // (original, temporary)
        let mut parked: Vec<(AlbumId, AlbumId)> = Vec::new();
        for &(current, _) in moves {
            let step = self
                .fresh_id()
                .and_then(|temporary| self.renumber(current, temporary).map(|()| temporary));
            match step {
                Ok(temporary) => parked.push((current, temporary)),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    self.roll_back(&[], &parked)?;
                    return Ok(Some(err));
                }
            }
        }

        // (target, temporary)
        let mut placed: Vec<(AlbumId, AlbumId)> = Vec::new();
        for (&(_, target), &(_, temporary)) in moves.iter().zip(&parked) {
            match self.renumber(temporary, target) {
                Ok(()) => placed.push((target, temporary)),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    self.roll_back(&placed, &parked)?;
                    return Ok(Some(err));
                }
            }
        }
        Ok(None)
    }

    fn roll_back(
        &mut self,
        placed: &[(AlbumId, AlbumId)],
        parked: &[(AlbumId, AlbumId)],
    ) -> Result<(), SyncError> {
        let undo = placed
            .iter()
            .rev()
            .copied()
            .chain(parked.iter().rev().map(|&(original, temporary)| (temporary, original)));
        for (from, to) in undo {
            match self.renumber(from, to) {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!("album {} could not be restored to {}: {}", from, to, err),
            }
        }
        Ok(())
    }

    fn renumber(&mut self, old: AlbumId, new: AlbumId) -> Result<(), SyncError> {
        match self.catalog.renumber_album(old, new) {
            Ok(()) => {
                self.index.rekey(old, new);
                Ok(())
            }
            Err(CatalogError::Connectivity(reason)) => Err(SyncError::Connectivity(reason)),
            Err(err) => Err(SyncError::AlbumRenumber {
                old: old.0,
                new: new.0,
                reason: err.to_string(),
            }),
        }
    }
}

pub fn album_title(segment: &str, max_len: usize) -> String {
    segment.chars().take(max_len).collect()
}

fn parse_album_id(token: &str) -> Result<AlbumId, SyncError> {
    token
        .parse::<u64>()
        .map(AlbumId)
        .map_err(|e| SyncError::PersistenceWrite(format!("invalid album id '{token}': {e}")))
}
