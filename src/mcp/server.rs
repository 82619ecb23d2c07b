use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ListResourceTemplatesResult, ListResourcesResult,
        PaginatedRequestParams, ProtocolVersion, RawResource, RawResourceTemplate,
        ReadResourceRequestParams, ReadResourceResult, Resource, ResourceContents,
        ResourceTemplate, ServerCapabilities, ServerInfo,
    },
    schemars,
    service::RequestContext,
    tool, tool_handler, tool_router,
};

use crate::config::types::CalendarConfig;
use crate::domain::availability::{
    AvailabilityRecord, CalendarSnapshot, DATE_FORMAT, parse_calendar_date,
};
use crate::domain::calendar_view::CalendarMonth;
use crate::domain::selection::{ClickOutcome, RangeSelectionController};
use crate::domain::session::CalendarSession;
use crate::error::{CalendarError, Result};
use crate::ports::availability_store::AvailabilityStore;

// ---------- Resource Store ----------

/// Thread-safe store of rendered calendars exposed as MCP resources.
/// Keys are URIs like `calendar://apartment/42/2024-06`, values are text content.
#[derive(Clone, Default)]
pub struct ResourceStore {
    entries: Arc<RwLock<HashMap<String, ResourceEntry>>>,
}

#[derive(Clone)]
struct ResourceEntry {
    name: String,
    text: String,
}

impl ResourceStore {
    async fn insert(&self, uri: impl Into<String>, name: impl Into<String>, text: String) {
        self.entries.write().await.insert(
            uri.into(),
            ResourceEntry {
                name: name.into(),
                text,
            },
        );
    }

    async fn get(&self, uri: &str) -> Option<ResourceEntry> {
        self.entries.read().await.get(uri).cloned()
    }

    async fn list(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(uri, entry)| (uri.clone(), entry.name.clone()))
            .collect();
        entries.sort();
        entries
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore").finish()
    }
}

// ---------- Tool parameter types ----------

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct MonthViewToolParams {
    /// Apartment ID in the listing backend (e.g. "42")
    pub apartment_id: String,
    /// Month to display (YYYY-MM). Defaults to the month containing `today`.
    pub month: Option<String>,
    /// Open the client-facing read-only calendar where no date can be selected
    pub read_only: Option<bool>,
    /// Reference date (YYYY-MM-DD) used to grey out past days. Defaults to the local date.
    pub today: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct NavigateToolParams {
    /// Apartment ID in the listing backend
    pub apartment_id: String,
    /// Months to move: 1 for next month, -1 for previous month
    pub delta: i32,
    /// Reference date (YYYY-MM-DD). Defaults to the local date.
    pub today: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct DateToolParams {
    /// Apartment ID in the listing backend
    pub apartment_id: String,
    /// Calendar date (YYYY-MM-DD)
    pub date: String,
    /// Reference date (YYYY-MM-DD). Defaults to the local date.
    pub today: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct ApartmentToolParams {
    /// Apartment ID in the listing backend
    pub apartment_id: String,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RemoveRangeToolParams {
    /// Apartment ID in the listing backend
    pub apartment_id: String,
    /// ID of the blocked record (from calendar_list_availabilities)
    pub record_id: u64,
}

// ---------- Helpers ----------

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate> {
    parse_calendar_date(raw).ok_or_else(|| CalendarError::InvalidParams {
        reason: format!("invalid {field} '{raw}', expected YYYY-MM-DD"),
    })
}

fn resolve_today(raw: Option<&str>) -> Result<NaiveDate> {
    raw.map_or_else(|| Ok(Local::now().date_naive()), |r| parse_date(r, "today"))
}

fn calendar_uri(apartment_id: &str, month: CalendarMonth) -> String {
    format!("calendar://apartment/{apartment_id}/{month}")
}

fn render(session: &CalendarSession, snapshot: &CalendarSnapshot<'_>) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Apartment {}", session.apartment_id());
    if !snapshot.is_listing_active {
        text.push_str("Listing is inactive: every date is blocked.\n");
    }
    text.push_str(&session.view(snapshot).to_string());
    text
}

fn describe_record(record: &AvailabilityRecord) -> String {
    let mut line = String::new();
    if let Some(id) = record.id {
        let _ = write!(line, "#{id} ");
    }
    let _ = write!(
        line,
        "{} to {} | {}",
        record.date_start.format(DATE_FORMAT),
        record.date_end.format(DATE_FORMAT),
        record.status
    );
    if let Some(source) = record.source {
        let _ = write!(line, " | {source}");
    }
    if let Some(ref guest) = record.guest_name {
        let _ = write!(line, " | guest: {guest}");
    }
    if !record.is_well_formed() {
        line.push_str(" | malformed: ends before it starts");
    }
    line
}

fn tool_result(result: Result<String>, action: &str) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => {
            warn!(error = %e, action, "Calendar tool failed");
            let hint = if e.is_retryable() {
                " This looks temporary; try again shortly."
            } else {
                ""
            };
            CallToolResult::error(vec![Content::text(format!("Failed to {action}: {e}.{hint}"))])
        }
    }
}

// ---------- MCP Server ----------

#[derive(Clone)]
pub struct CalendarMcpServer {
    store: Arc<dyn AvailabilityStore>,
    settings: CalendarConfig,
    sessions: Arc<Mutex<HashMap<String, CalendarSession>>>,
    tool_router: ToolRouter<Self>,
    resources: ResourceStore,
}

impl CalendarMcpServer {
    /// Fetch the current snapshot for an apartment, ordered by the configured overlap policy.
    async fn load_snapshot(&self, apartment_id: &str) -> Result<(Vec<AvailabilityRecord>, bool)> {
        let mut records = self.store.fetch_availabilities(apartment_id).await?;
        let is_active = self.store.is_listing_active(apartment_id).await?;
        self.settings.overlap_policy.apply(&mut records);
        Ok((records, is_active))
    }

    fn new_session(&self, apartment_id: &str, month: CalendarMonth, read_only: bool) -> CalendarSession {
        CalendarSession::new(
            apartment_id,
            month,
            self.settings.week_start,
            read_only,
            self.settings.selection_policy,
        )
    }

    async fn publish(&self, apartment_id: &str, month: CalendarMonth, text: String) {
        let uri = calendar_uri(apartment_id, month);
        let name = format!("Calendar: apartment {apartment_id}, {}", month.label());
        self.resources.insert(uri, name, text).await;
    }

    async fn month_view(&self, params: MonthViewToolParams) -> Result<String> {
        let today = resolve_today(params.today.as_deref())?;
        let month = match params.month.as_deref() {
            Some(raw) => raw.parse::<CalendarMonth>()?,
            None => CalendarMonth::containing(today),
        };
        let read_only = params.read_only.unwrap_or(self.settings.read_only);
        let (records, is_active) = self.load_snapshot(&params.apartment_id).await?;

        let session = self.new_session(&params.apartment_id, month, read_only);
        let snapshot = CalendarSnapshot::new(&records, is_active, today);
        let text = render(&session, &snapshot);
        self.sessions
            .lock()
            .await
            .insert(params.apartment_id.clone(), session);
        debug!(apartment_id = %params.apartment_id, %month, read_only, "Opened calendar");

        self.publish(&params.apartment_id, month, text.clone()).await;
        Ok(text)
    }

    async fn navigate(&self, params: NavigateToolParams) -> Result<String> {
        let today = resolve_today(params.today.as_deref())?;
        let (records, is_active) = self.load_snapshot(&params.apartment_id).await?;
        let snapshot = CalendarSnapshot::new(&records, is_active, today);

        let (text, month) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .entry(params.apartment_id.clone())
                .or_insert_with(|| {
                    self.new_session(
                        &params.apartment_id,
                        CalendarMonth::containing(today),
                        self.settings.read_only,
                    )
                });
            let month = session.navigate(params.delta);
            (render(session, &snapshot), month)
        };

        self.publish(&params.apartment_id, month, text.clone()).await;
        Ok(text)
    }

    async fn date_status(&self, params: DateToolParams) -> Result<String> {
        let date = parse_date(&params.date, "date")?;
        let today = resolve_today(params.today.as_deref())?;
        let (records, is_active) = self.load_snapshot(&params.apartment_id).await?;
        let snapshot = CalendarSnapshot::new(&records, is_active, today);

        let status = snapshot.resolve(date);
        let mut text = format!("{}: {status}\n", date.format(DATE_FORMAT));
        if let Some(hover) = snapshot.hover(date) {
            let _ = writeln!(text, "Details: {hover}");
        }
        let selectable = match self.sessions.lock().await.get(&params.apartment_id) {
            Some(session) => session.controller().accepts(&status, is_active),
            None => RangeSelectionController::new(
                self.settings.read_only,
                self.settings.selection_policy,
            )
            .accepts(&status, is_active),
        };
        let _ = writeln!(text, "Selectable: {}", if selectable { "yes" } else { "no" });
        Ok(text)
    }

    async fn click_date(&self, params: DateToolParams) -> Result<String> {
        let date = parse_date(&params.date, "date")?;
        let today = resolve_today(params.today.as_deref())?;
        let (records, is_active) = self.load_snapshot(&params.apartment_id).await?;
        let snapshot = CalendarSnapshot::new(&records, is_active, today);

        let (outcome, anchor) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .entry(params.apartment_id.clone())
                .or_insert_with(|| {
                    self.new_session(
                        &params.apartment_id,
                        CalendarMonth::containing(date),
                        self.settings.read_only,
                    )
                });
            let anchor = session.anchor();
            let outcome = session.controller().evaluate_click(date, &snapshot);
            if outcome.record().is_none() {
                session.controller_mut().apply(&outcome);
            }
            (outcome, anchor)
        };

        let record = match &outcome {
            ClickOutcome::Ignored => {
                let mut text = format!(
                    "{date} cannot be selected (status: {}). Selection unchanged.",
                    snapshot.resolve(date)
                );
                if let Some(anchor) = anchor {
                    let _ = write!(text, " Range start is still {anchor}.");
                }
                return Ok(text);
            }
            ClickOutcome::Suppressed => {
                return Ok("This calendar is read-only; dates cannot be selected.".to_string());
            }
            ClickOutcome::Anchored(anchor) => {
                return Ok(format!(
                    "Range start set to {anchor}. Click an end date to block the range."
                ));
            }
            ClickOutcome::RangeCompleted(record) => record.clone(),
        };

        // The session lock is released while saving. A failed save leaves the
        // pending anchor in place; a session changed meanwhile is left alone.
        let saved = self
            .store
            .save_blocked_range(&params.apartment_id, &record)
            .await?;
        info!(
            apartment_id = %params.apartment_id,
            start = %saved.date_start,
            end = %saved.date_end,
            "Blocked range from calendar selection"
        );

        if let Some(session) = self.sessions.lock().await.get_mut(&params.apartment_id) {
            if session.anchor() == anchor {
                session.controller_mut().apply(&outcome);
            } else {
                debug!(
                    apartment_id = %params.apartment_id,
                    "Selection changed while saving; keeping the newer state"
                );
            }
        }

        let mut text = format!(
            "Blocked {} to {} ({} days).",
            saved.date_start.format(DATE_FORMAT),
            saved.date_end.format(DATE_FORMAT),
            saved.day_count()
        );
        if let Some(id) = saved.id {
            let _ = write!(text, " Record ID: {id}.");
        }
        Ok(text)
    }

    async fn reset_selection(&self, params: &ApartmentToolParams) -> String {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&params.apartment_id) {
            Some(session) if session.anchor().is_some() => {
                session.reset_selection();
                "Pending range selection cleared.".to_string()
            }
            Some(_) => "No range selection was pending.".to_string(),
            None => format!(
                "No open calendar for apartment {}. Use calendar_month_view first.",
                params.apartment_id
            ),
        }
    }

    async fn list_availabilities(&self, apartment_id: &str) -> Result<String> {
        let records = self.store.fetch_availabilities(apartment_id).await?;
        if records.is_empty() {
            return Ok(format!(
                "Apartment {apartment_id} has no availability records: every future date is available."
            ));
        }
        let mut text = format!(
            "Apartment {apartment_id}: {} availability records\n",
            records.len()
        );
        for record in &records {
            let _ = writeln!(text, "- {}", describe_record(record));
        }
        Ok(text)
    }
}

#[tool_router]
impl CalendarMcpServer {
    pub fn new(store: Arc<dyn AvailabilityStore>, settings: CalendarConfig) -> Self {
        Self {
            store,
            settings,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            tool_router: Self::tool_router(),
            resources: ResourceStore::default(),
        }
    }

    /// Open (or reopen) an apartment's calendar on a month.
    #[tool(
        name = "calendar_month_view",
        description = "Show an apartment's availability calendar for one month as a weekly grid. Each day is marked available, booked (Uilet.kz, Airbnb or Booking.com), blocked, or past. Opening a calendar starts a fresh selection session.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn calendar_month_view(
        &self,
        Parameters(params): Parameters<MonthViewToolParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(tool_result(self.month_view(params).await, "show calendar"))
    }

    /// Move the open calendar to another month.
    #[tool(
        name = "calendar_navigate",
        description = "Move an apartment's open calendar forward or backward by a number of months (1 = next, -1 = previous) and show it. A pending range selection is kept.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn calendar_navigate(
        &self,
        Parameters(params): Parameters<NavigateToolParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(tool_result(self.navigate(params).await, "navigate calendar"))
    }

    /// Resolve a single date.
    #[tool(
        name = "calendar_date_status",
        description = "Get the status of a single date for an apartment (available, booked with source and guest, blocked, or past) and whether it can be selected.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn calendar_date_status(
        &self,
        Parameters(params): Parameters<DateToolParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(tool_result(self.date_status(params).await, "resolve date"))
    }

    /// Click a date in the open calendar.
    #[tool(
        name = "calendar_click_date",
        description = "Click a date to block a range: the first click sets the range start, the second click sets the end and saves the range as blocked. Only available dates can be clicked.",
        annotations(destructive_hint = false, idempotent_hint = false, open_world_hint = true)
    )]
    async fn calendar_click_date(
        &self,
        Parameters(params): Parameters<DateToolParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(tool_result(self.click_date(params).await, "select date"))
    }

    /// Drop a pending range start.
    #[tool(
        name = "calendar_reset_selection",
        description = "Cancel a pending range selection (a first click without a second click) for an apartment's calendar.",
        annotations(idempotent_hint = true, open_world_hint = false)
    )]
    async fn calendar_reset_selection(
        &self,
        Parameters(params): Parameters<ApartmentToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let text = self.reset_selection(&params).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    /// List raw availability records.
    #[tool(
        name = "calendar_list_availabilities",
        description = "List an apartment's availability records (bookings and manual blocks) with their IDs, date ranges, sources and guests.",
        annotations(read_only_hint = true, open_world_hint = true)
    )]
    async fn calendar_list_availabilities(
        &self,
        Parameters(params): Parameters<ApartmentToolParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(tool_result(
            self.list_availabilities(&params.apartment_id).await,
            "list availabilities",
        ))
    }

    /// Delete a manual block.
    #[tool(
        name = "calendar_remove_blocked_range",
        description = "Remove a manually blocked date range by record ID. Bookings from Uilet.kz, Airbnb or Booking.com cannot be removed here.",
        annotations(destructive_hint = true, idempotent_hint = true, open_world_hint = true)
    )]
    async fn calendar_remove_blocked_range(
        &self,
        Parameters(params): Parameters<RemoveRangeToolParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .store
            .remove_blocked_range(&params.apartment_id, params.record_id)
            .await
            .map(|()| {
                format!(
                    "Removed blocked range #{} from apartment {}.",
                    params.record_id, params.apartment_id
                )
            });
        Ok(tool_result(result, "remove blocked range"))
    }
}

#[tool_handler]
impl ServerHandler for CalendarMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Uilet apartment availability calendar.\n\
                 \n\
                 ## Viewing\n\
                 - calendar_month_view: month grid for an apartment (YYYY-MM), optionally read-only\n\
                 - calendar_navigate: move the open calendar by N months\n\
                 - calendar_date_status: status, booking source and guest for one date\n\
                 - calendar_list_availabilities: raw bookings and blocks with record IDs\n\
                 \n\
                 ## Blocking dates\n\
                 - calendar_click_date: first click sets the range start, second click saves the blocked range\n\
                 - calendar_reset_selection: cancel a pending range start\n\
                 - calendar_remove_blocked_range: delete a manual block by record ID\n\
                 \n\
                 ## Rules\n\
                 Past dates, booked dates and every date of an inactive listing cannot be selected. \
                 Bookings from external channels are read-only.\n\
                 \n\
                 ## Resources\n\
                 Rendered months are published as calendar://apartment/{id}/{YYYY-MM}."
                    .into(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let entries = self.resources.list().await;
        let resources: Vec<Resource> = entries
            .into_iter()
            .map(|(uri, name)| Resource {
                annotations: None,
                raw: RawResource {
                    uri,
                    name,
                    title: None,
                    description: None,
                    mime_type: Some("text/plain".into()),
                    size: None,
                    icons: None,
                    meta: None,
                },
            })
            .collect();
        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: None,
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let templates = vec![ResourceTemplate {
            annotations: None,
            raw: RawResourceTemplate {
                uri_template: "calendar://apartment/{id}/{month}".into(),
                name: "Availability Calendar".into(),
                title: Some("Monthly availability calendar".into()),
                description: Some(
                    "Month grid rendered by calendar_month_view or calendar_navigate".into(),
                ),
                mime_type: Some("text/plain".into()),
                icons: None,
            },
        }];
        Ok(ListResourceTemplatesResult {
            resource_templates: templates,
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match self.resources.get(&request.uri).await {
            Some(entry) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(entry.text, request.uri)],
            }),
            None => Err(McpError::resource_not_found(
                format!("resource not found: {}", request.uri),
                None,
            )),
        }
    }
}
