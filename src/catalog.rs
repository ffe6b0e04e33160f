//! The catalog service: drives page loads, merges results into the entity
//! store, keeps the query cache and pagination in step, and exposes the
//! visible state.
//!
//! All mutation goes through [`Catalog`]. Its state lives behind a mutex
//! that is never held across an await, so reads of loaded data stay
//! available while a fetch is outstanding.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{ListingSource, ListingsPage, PageRequest};
use crate::cache::{
  CacheSource, EntityStore, FilterStaging, Pagination, QueryCache, SavedFilters, SlotStorage,
  StoredSlot, VisibleList,
};
use crate::error::SyncError;
use crate::listing::{
  Apartment, FilterPatch, FilterState, QuerySignature, SortDirection, SortState, ValueRange,
};

/// Name of the durable slot holding the applied filters and sort.
pub const FILTER_SLOT: &str = "apartments-filters";

/// Largest page the listings endpoint serves.
pub const MAX_PAGE_SIZE: usize = 100;

/// Construction-time settings
#[derive(Debug, Clone)]
pub struct CatalogOptions {
  pub items_per_page: usize,
  pub prefetch_page_size: usize,
  /// Initial filter and slider bounds until the backend declares its own
  pub price_range: ValueRange,
  pub area_range: ValueRange,
}

impl Default for CatalogOptions {
  fn default() -> Self {
    Self {
      items_per_page: 5,
      prefetch_page_size: 50,
      price_range: ValueRange(5_500_000, 18_900_000),
      area_range: ValueRange(33, 123),
    }
  }
}

/// In-flight markers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadFlags {
  /// A reset load is running
  pub loading: bool,
  /// An append load is running
  pub appending: bool,
  /// A filter commit is being applied
  pub filtering: bool,
}

/// What a load call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
  /// A page (or, for prefetch, several) came back with `count` listings
  Loaded { source: CacheSource, count: usize },
  /// Guard rejected the call; nothing happened
  Skipped,
  /// The response arrived after a newer reset; merged but not paginated
  Stale,
}

/// Owned, read-only view of the catalog
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
  pub listings: Vec<Apartment>,
  pub stored: usize,
  pub pagination: Pagination,
  pub flags: LoadFlags,
  pub error: Option<String>,
  pub draft: FilterState,
  pub applied: FilterState,
  pub sort: SortState,
  pub price_bounds: ValueRange,
  pub area_bounds: ValueRange,
  pub active_filters: usize,
  pub signature: QuerySignature,
  /// Every page of the active signature is cached
  pub cache_complete: bool,
  pub cached_queries: usize,
}

struct CatalogState {
  entities: EntityStore<Apartment>,
  queries: QueryCache,
  staging: FilterStaging,
  sort: SortState,
  pagination: Pagination,
  price_bounds: ValueRange,
  area_bounds: ValueRange,
  visible: VisibleList,
  flags: LoadFlags,
  error: Option<String>,
  prefetched_rooms: BTreeSet<u32>,
  prefetching_rooms: BTreeSet<u32>,
  /// Bumped by every reset; responses from an older epoch are stale
  epoch: u64,
  /// The next reset fetch replaces the store instead of merging into it
  purge_next: bool,
  initialized: bool,
}

/// A fetch captured at request time
struct LoadTicket {
  signature: QuerySignature,
  page_index: usize,
  epoch: u64,
  reset: bool,
  purge: bool,
  request: PageRequest,
}

enum Begin {
  Done(LoadOutcome),
  Fetch(LoadTicket),
}

impl CatalogState {
  fn new(options: &CatalogOptions) -> Self {
    Self {
      entities: EntityStore::new(),
      queries: QueryCache::new(),
      staging: FilterStaging::new(FilterState::new(options.price_range, options.area_range)),
      sort: SortState::default(),
      pagination: Pagination::new(options.items_per_page.min(MAX_PAGE_SIZE)),
      price_bounds: options.price_range,
      area_bounds: options.area_range,
      visible: VisibleList::default(),
      flags: LoadFlags::default(),
      error: None,
      prefetched_rooms: BTreeSet::new(),
      prefetching_rooms: BTreeSet::new(),
      epoch: 0,
      purge_next: false,
      initialized: false,
    }
  }

  fn signature(&self) -> QuerySignature {
    QuerySignature::new(self.staging.applied(), &self.sort)
  }

  fn begin_load(&mut self, reset: bool) -> Begin {
    let signature = self.signature();
    debug!(
      reset,
      current_page = self.pagination.current_page,
      has_more = self.pagination.has_more,
      sig = %signature,
      "loadApartments start"
    );

    if reset {
      self.epoch += 1;

      if !self.purge_next {
        if let Some(entry) = self.queries.get(&signature) {
          let intact = entry.ids().all(|id| self.entities.get(id).is_some());
          if entry.complete && intact {
            debug!(sig = %signature, pages = entry.page_count(), "Serving reset from full cache");
            let (pages, total) = (entry.page_count(), entry.total);
            self.pagination.finish(pages, total);
            self.flags = LoadFlags::default();
            self.error = None;
            return Begin::Done(LoadOutcome::Loaded {
              source: CacheSource::Cache,
              count: total,
            });
          }
        }
      }

      self.pagination.reset();
      self.flags.loading = true;
      // An append still in flight belongs to the old epoch
      self.flags.appending = false;
      self.error = None;
    } else {
      self.flags.appending = true;
    }

    let request = PageRequest {
      offset: self.pagination.offset(),
      limit: self.pagination.items_per_page,
      sort: self.sort.clone(),
      filters: self.staging.applied().clone(),
    };

    Begin::Fetch(LoadTicket {
      signature,
      page_index: self.pagination.current_page,
      epoch: self.epoch,
      reset,
      purge: reset && std::mem::take(&mut self.purge_next),
      request,
    })
  }

  fn finish_load(
    &mut self,
    ticket: LoadTicket,
    result: Result<ListingsPage, SyncError>,
  ) -> Result<LoadOutcome, SyncError> {
    let current = ticket.epoch == self.epoch;

    let page = match result {
      Ok(page) => page,
      Err(e) => {
        warn!(sig = %ticket.signature, page = ticket.page_index, "Load failed: {}", e);
        if current {
          self.error = Some(e.to_string());
          self.flags = LoadFlags::default();
          self.purge_next |= ticket.purge;
        }
        return Err(e);
      }
    };

    debug!(
      total = ?page.total,
      batch = page.listings.len(),
      "Response meta"
    );

    // Stale pages still merge into the store
    if self.entities.upsert(&page.listings, ticket.purge) {
      self.visible.invalidate();
    }

    if ticket.reset {
      self.queries.discard(&ticket.signature);
    }
    let loaded_before = self
      .queries
      .get(&ticket.signature)
      .map(|entry| entry.contiguous_loaded())
      .unwrap_or(0);
    let batch = page.listings.len();
    let ids = page.listings.iter().map(|a| a.id.clone()).collect();
    let declared = page.total.unwrap_or(loaded_before + batch);

    let entry = self
      .queries
      .record_page(&ticket.signature, ticket.page_index, ids, declared);
    let loaded = entry.contiguous_loaded();
    let mut total = entry.total;
    if batch == 0 && !entry.complete {
      // Server promised more than it delivers
      self.queries.mark_exhausted(&ticket.signature);
      total = loaded;
    }

    if !current {
      debug!(sig = %ticket.signature, page = ticket.page_index, "Stale response merged");
      return Ok(LoadOutcome::Stale);
    }

    if ticket.reset {
      if let Some(range) = page.price_range {
        self.price_bounds = range;
      }
      if let Some(range) = page.area_range {
        self.area_bounds = range;
      }
    }

    self.pagination.advance(loaded, total);
    self.flags = LoadFlags::default();
    self.error = None;

    debug!(
      current_page = self.pagination.current_page,
      loaded,
      total = self.pagination.total_items,
      has_more = self.pagination.has_more,
      "Pagination update"
    );

    Ok(LoadOutcome::Loaded {
      source: CacheSource::Network,
      count: batch,
    })
  }

  /// The applied signature changed: restart pagination for it and orphan
  /// any load still running for the old one.
  fn switch_signature(&mut self) {
    self.epoch += 1;
    self.pagination.reset();
    self.flags.loading = false;
    self.flags.appending = false;
    self.visible.invalidate();
  }

  fn active_filters(&self) -> usize {
    let applied = self.staging.applied();
    [
      !applied.rooms.is_empty(),
      applied.price_range != self.price_bounds,
      applied.area_range != self.area_bounds,
    ]
    .into_iter()
    .filter(|differs| *differs)
    .count()
  }
}

/// Catalog service handle. Clones share the same state.
pub struct Catalog<S, P> {
  source: Arc<S>,
  storage: Arc<P>,
  state: Arc<Mutex<CatalogState>>,
  revision: Arc<watch::Sender<u64>>,
  prefetch_page_size: usize,
}

impl<S, P> Clone for Catalog<S, P> {
  fn clone(&self) -> Self {
    Self {
      source: Arc::clone(&self.source),
      storage: Arc::clone(&self.storage),
      state: Arc::clone(&self.state),
      revision: Arc::clone(&self.revision),
      prefetch_page_size: self.prefetch_page_size,
    }
  }
}

impl<S: ListingSource, P: SlotStorage> Catalog<S, P> {
  pub fn new(source: S, storage: P, options: CatalogOptions) -> Self {
    let (revision, _) = watch::channel(0);
    Self {
      source: Arc::new(source),
      storage: Arc::new(storage),
      state: Arc::new(Mutex::new(CatalogState::new(&options))),
      revision: Arc::new(revision),
      prefetch_page_size: options.prefetch_page_size.clamp(1, MAX_PAGE_SIZE),
    }
  }

  fn lock(&self) -> MutexGuard<'_, CatalogState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn notify(&self) {
    self.revision.send_modify(|revision| *revision += 1);
  }

  /// Receiver that changes whenever the visible state does.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.revision.subscribe()
  }

  /// Restore saved filters and load the first page. Later calls do nothing.
  pub async fn init(&self) -> Result<LoadOutcome, SyncError> {
    {
      let mut state = self.lock();
      if state.initialized {
        return Ok(LoadOutcome::Skipped);
      }
      state.initialized = true;

      match self.storage.load::<SavedFilters>(FILTER_SLOT) {
        Ok(Some(StoredSlot { value, saved_at })) => {
          info!(%saved_at, "Restored saved filters");
          let (filters, sort) = value.into_parts();
          state.staging.restore(filters);
          state.sort = sort;
        }
        Ok(None) => debug!("No saved filters"),
        Err(e) => {
          let error = SyncError::Persistence(e.to_string());
          warn!("{}; using defaults", error);
        }
      }
    }

    self.load_apartments(true).await
  }

  /// Load a page for the applied filters and sort.
  ///
  /// With `reset`, pagination restarts at page 0 and a fully cached
  /// signature is served without a network call. Otherwise the next page
  /// is appended.
  pub async fn load_apartments(&self, reset: bool) -> Result<LoadOutcome, SyncError> {
    let begin = self.lock().begin_load(reset);
    self.run(begin).await
  }

  /// Append the next page unless the end was reached or a load is running.
  pub async fn load_more(&self) -> Result<LoadOutcome, SyncError> {
    let begin = {
      let mut state = self.lock();
      if !state.pagination.has_more || state.flags.loading || state.flags.appending {
        debug!(
          has_more = state.pagination.has_more,
          flags = ?state.flags,
          "loadMore suppressed"
        );
        Begin::Done(LoadOutcome::Skipped)
      } else {
        state.begin_load(false)
      }
    };
    self.run(begin).await
  }

  async fn run(&self, begin: Begin) -> Result<LoadOutcome, SyncError> {
    let ticket = match begin {
      Begin::Done(outcome) => {
        if outcome != LoadOutcome::Skipped {
          self.notify();
        }
        return Ok(outcome);
      }
      Begin::Fetch(ticket) => ticket,
    };
    self.notify();

    let result = self.source.fetch_page(&ticket.request).await;
    let outcome = self.lock().finish_load(ticket, result);
    self.notify();
    outcome
  }

  /// Merge a partial update into the draft filters.
  pub fn set_draft(&self, patch: FilterPatch) {
    self.lock().staging.set_draft(patch);
    self.notify();
  }

  /// Move the draft into the applied filters.
  ///
  /// Returns false and has no effect at all when nothing differs. Otherwise
  /// the visible list is invalidated, the applied state persisted, and the
  /// `filtering` flag raised until the next scheduler tick.
  pub async fn commit_filters(&self) -> bool {
    {
      let mut state = self.lock();
      if !state.staging.commit() {
        debug!("Filters unchanged, commit skipped");
        return false;
      }
      state.switch_signature();
      state.flags.filtering = true;
      self.persist(&state);
      info!(sig = %state.signature().short_hash(), "Filters committed");
    }
    self.notify();

    tokio::task::yield_now().await;

    self.lock().flags.filtering = false;
    self.notify();
    true
  }

  /// Commit, then reload from page 0 if anything changed.
  pub async fn apply_filters(&self) -> Result<LoadOutcome, SyncError> {
    if self.commit_filters().await {
      self.load_apartments(true).await
    } else {
      Ok(LoadOutcome::Skipped)
    }
  }

  /// Clear the draft to the full available ranges and commit it.
  pub async fn reset_filters(&self) -> bool {
    {
      let mut state = self.lock();
      let (price, area) = (state.price_bounds, state.area_bounds);
      state.staging.clear_draft(price, area);
    }
    self.commit_filters().await
  }

  /// Change the sort. Returns false when it is already in effect.
  pub fn update_sort(&self, field: &str, direction: SortDirection) -> bool {
    let sort = SortState::new(field, direction);
    {
      let mut state = self.lock();
      if state.sort == sort {
        return false;
      }
      state.sort = sort;
      state.switch_signature();
      self.persist(&state);
      info!(sig = %state.signature().short_hash(), "Sort updated");
    }
    self.notify();
    true
  }

  /// Change the sort, then reload from page 0 if it changed.
  pub async fn apply_sort(
    &self,
    field: &str,
    direction: SortDirection,
  ) -> Result<LoadOutcome, SyncError> {
    if self.update_sort(field, direction) {
      self.load_apartments(true).await
    } else {
      Ok(LoadOutcome::Skipped)
    }
  }

  /// Prefetch every listing with the given room count.
  ///
  /// Pages of the prefetch size are fetched until a short page comes back
  /// or the declared total is reached. A room count that was already
  /// prefetched (or is being prefetched) is skipped.
  pub async fn load_room(&self, rooms: u32) -> Result<LoadOutcome, SyncError> {
    {
      let mut state = self.lock();
      if state.prefetched_rooms.contains(&rooms) || !state.prefetching_rooms.insert(rooms) {
        debug!(rooms, "Room already prefetched");
        return Ok(LoadOutcome::Skipped);
      }
    }

    let result = self.prefetch_room(rooms).await;

    {
      let mut state = self.lock();
      state.prefetching_rooms.remove(&rooms);
      match &result {
        Ok(count) => {
          info!(rooms, count, "Room prefetched");
          state.prefetched_rooms.insert(rooms);
        }
        Err(e) => {
          warn!(rooms, "Room prefetch failed: {}", e);
          state.error = Some(e.to_string());
        }
      }
    }
    self.notify();

    result.map(|count| LoadOutcome::Loaded {
      source: CacheSource::Network,
      count,
    })
  }

  async fn prefetch_room(&self, rooms: u32) -> Result<usize, SyncError> {
    let limit = self.prefetch_page_size;
    let mut filters = FilterState::new(ValueRange(0, 0), ValueRange(0, 0));
    filters.rooms.insert(rooms);

    let mut offset = 0;
    loop {
      let request = PageRequest {
        offset,
        limit,
        sort: SortState::default(),
        filters: filters.clone(),
      };
      let page = self.source.fetch_page(&request).await?;
      let batch = page.listings.len();
      debug!(rooms, offset, batch, total = ?page.total, "Prefetch page");

      {
        let mut state = self.lock();
        if state.entities.upsert(&page.listings, false) {
          state.visible.invalidate();
        }
      }
      self.notify();

      offset += batch;
      if batch < limit || page.total.is_some_and(|total| offset >= total) {
        return Ok(offset);
      }
    }
  }

  /// Drop every cached query and replace the store with a fresh first page.
  pub async fn hard_reset(&self) -> Result<LoadOutcome, SyncError> {
    {
      let mut state = self.lock();
      state.queries.clear();
      state.prefetched_rooms.clear();
      state.purge_next = true;
      info!("Hard reset requested");
    }
    self.load_apartments(true).await
  }

  /// Current state, with the visible list derived from the store.
  pub fn snapshot(&self) -> CatalogSnapshot {
    let mut guard = self.lock();
    let state = &mut *guard;
    let signature = state.signature();
    let listings = state
      .visible
      .listings(&state.entities, state.staging.applied(), &state.sort);
    let cache_complete = state
      .queries
      .get(&signature)
      .is_some_and(|entry| entry.complete);

    CatalogSnapshot {
      listings,
      stored: state.entities.len(),
      pagination: state.pagination,
      flags: state.flags,
      error: state.error.clone(),
      draft: state.staging.draft().clone(),
      applied: state.staging.applied().clone(),
      sort: state.sort.clone(),
      price_bounds: state.price_bounds,
      area_bounds: state.area_bounds,
      active_filters: state.active_filters(),
      signature,
      cache_complete,
      cached_queries: state.queries.len(),
    }
  }

  /// Write the applied filters and sort. Failures are logged, never raised.
  fn persist(&self, state: &CatalogState) {
    let saved = SavedFilters::new(state.staging.applied(), &state.sort);
    match self.storage.save(FILTER_SLOT, &saved) {
      Ok(()) => debug!("Saved filters"),
      Err(e) => warn!("{}", SyncError::Persistence(e.to_string())),
    }
  }
}
