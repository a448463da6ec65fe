//! The interactive report form: component layout, per-owner state machine
//! and the finish flow that hands completed sessions to the submitter.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use reportbridge_config::MessagesConfig;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chat::{
    ActionRow, Button, ButtonStyle, ChatApi, ChatError, Component, InteractionReply, Modal,
    SelectChoice, SelectMenu, TextInput,
};
use crate::events::{ChatEvent, Interaction, MessageRef};
use crate::schema::{FieldDescriptor, FieldKind, SchemaSnapshot};
use crate::session::{DrainOutcome, SessionStore};
use crate::submitter::RecordSubmitter;

pub const FINISH_ID: &str = "finishReport";
pub const TEXT_MODAL_PREFIX: &str = "text_";

// Chat platform limits.
const MAX_ROWS: usize = 5;
const MAX_BUTTONS_PER_ROW: usize = 5;
const MAX_SELECT_OPTIONS: usize = 25;
const TEXT_MAX_LENGTH: u16 = 2000;

/// Owners remembered as `Submitted` before the oldest are forgotten.
const SUBMITTED_MEMORY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    NotStarted,
    InProgress,
    ReadyToSubmit,
    Submitted,
}

// ── Layout ───────────────────────────────────────────────────────────────────

/// Components rendered for one schema, plus the fields they present.
#[derive(Debug, Clone, PartialEq)]
pub struct FormLayout {
    pub rows: Vec<ActionRow>,
    /// Fields that made it onto the message; exactly the required set.
    pub fields: Vec<FieldDescriptor>,
    pub title_field: String,
}

impl FormLayout {
    pub fn build(schema: &SchemaSnapshot) -> Self {
        let mut selects = Vec::new();
        let mut text_buttons = Vec::new();
        let mut fields = Vec::new();

        for field in schema.interactive_fields() {
            let (extra_selects, extra_buttons) = match field.kind {
                FieldKind::ShortText => (0, 1),
                _ => (1, 0),
            };
            if rows_needed(selects.len() + extra_selects, text_buttons.len() + extra_buttons)
                > MAX_ROWS
            {
                warn!(
                    field = %field.id,
                    "form message is full; field left out of the form"
                );
                continue;
            }
            match field.kind {
                FieldKind::ShortText => text_buttons.push(text_button(&field.id)),
                FieldKind::Boolean => selects.push(boolean_select(&field.id)),
                _ => selects.push(choice_select(field)),
            }
            fields.push(field.clone());
        }

        let mut rows: Vec<ActionRow> = selects
            .into_iter()
            .map(|menu| ActionRow::of(vec![Component::Select(menu)]))
            .collect();
        text_buttons.push(finish_button());
        for chunk in text_buttons.chunks(MAX_BUTTONS_PER_ROW) {
            rows.push(ActionRow::of(
                chunk.iter().cloned().map(Component::Button).collect(),
            ));
        }

        Self {
            rows,
            fields,
            title_field: schema.title_field().to_string(),
        }
    }

    pub fn required_fields(&self) -> impl Iterator<Item = String> + '_ {
        self.fields.iter().map(|field| field.id.clone())
    }

    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.id == id)
    }
}

/// Rows for `selects` select menus plus `buttons` text buttons and the
/// finish button.
fn rows_needed(selects: usize, buttons: usize) -> usize {
    selects + (buttons + 1).div_ceil(MAX_BUTTONS_PER_ROW)
}

fn choice_select(field: &FieldDescriptor) -> SelectMenu {
    if field.choices.len() > MAX_SELECT_OPTIONS {
        warn!(
            field = %field.id,
            choices = field.choices.len(),
            "select field has more options than a menu can show; extra options hidden"
        );
    }
    SelectMenu {
        custom_id: field.id.clone(),
        placeholder: Some(field.id.clone()),
        options: field
            .choices
            .iter()
            .take(MAX_SELECT_OPTIONS)
            .map(|choice| SelectChoice::new(choice, choice))
            .collect(),
        disabled: false,
    }
}

fn boolean_select(field: &str) -> SelectMenu {
    SelectMenu {
        custom_id: field.to_string(),
        placeholder: Some(field.to_string()),
        options: vec![SelectChoice::new("Yes", "yes"), SelectChoice::new("No", "no")],
        disabled: false,
    }
}

fn text_button(field: &str) -> Button {
    Button {
        custom_id: field.to_string(),
        label: field.to_string(),
        style: ButtonStyle::Primary,
        emoji: Some("📝".to_string()),
        disabled: false,
    }
}

fn finish_button() -> Button {
    Button {
        custom_id: FINISH_ID.to_string(),
        label: "Finish report".to_string(),
        style: ButtonStyle::Primary,
        emoji: Some("✅".to_string()),
        disabled: true,
    }
}

pub fn text_modal(field: &str) -> Modal {
    Modal {
        custom_id: format!("{TEXT_MODAL_PREFIX}{field}"),
        title: format!("Enter {field}"),
        rows: vec![ActionRow::of(vec![Component::TextInput(TextInput {
            custom_id: field.to_string(),
            label: field.to_string(),
            placeholder: Some("Enter your text here...".to_string()),
            min_length: 1,
            max_length: TEXT_MAX_LENGTH,
            multiline: true,
        })])],
    }
}

/// Rewrite the current rows of the form message: selects show the owner's
/// chosen values, the finish button follows `ready`, everything else is kept
/// as it is.
pub fn apply_selections(
    rows: &[ActionRow],
    answers: &HashMap<String, String>,
    ready: bool,
) -> Vec<ActionRow> {
    rows.iter()
        .map(|row| {
            ActionRow::of(
                row.components
                    .iter()
                    .map(|component| match component {
                        Component::Button(button) if button.custom_id == FINISH_ID => {
                            Component::Button(Button {
                                disabled: !ready,
                                ..button.clone()
                            })
                        }
                        Component::Select(menu) => match answers.get(&menu.custom_id) {
                            Some(value) => Component::Select(menu.clone().with_selected(value)),
                            None => component.clone(),
                        },
                        other => other.clone(),
                    })
                    .collect(),
            )
        })
        .collect()
}

// ── Controller ───────────────────────────────────────────────────────────────

/// Owners whose last action was a successful submission.  Bounded; the
/// oldest entry is evicted first and falls back to `NotStarted`.
#[derive(Debug)]
struct RecentSubmitters {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl RecentSubmitters {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
            capacity,
        }
    }

    fn insert(&mut self, owner: &str) {
        if !self.members.insert(owner.to_string()) {
            return;
        }
        self.order.push_back(owner.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, owner: &str) {
        if self.members.remove(owner) {
            self.order.retain(|entry| entry != owner);
        }
    }

    fn contains(&self, owner: &str) -> bool {
        self.members.contains(owner)
    }
}

/// Where the form message lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMessage {
    pub channel_id: String,
    pub message_id: String,
}

#[derive(Clone)]
pub struct FormController {
    chat: Arc<dyn ChatApi>,
    sessions: Arc<SessionStore>,
    submitter: RecordSubmitter,
    layout: Arc<FormLayout>,
    messages: Arc<MessagesConfig>,
    message: Arc<FormMessage>,
    submitted: Arc<Mutex<RecentSubmitters>>,
}

impl FormController {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        submitter: RecordSubmitter,
        layout: FormLayout,
        messages: MessagesConfig,
        message: FormMessage,
    ) -> Self {
        Self {
            chat,
            sessions: Arc::new(SessionStore::new(layout.required_fields())),
            submitter,
            layout: Arc::new(layout),
            messages: Arc::new(messages),
            message: Arc::new(message),
            submitted: Arc::new(Mutex::new(RecentSubmitters::new(SUBMITTED_MEMORY))),
        }
    }

    pub fn layout(&self) -> &FormLayout {
        &self.layout
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn message(&self) -> &FormMessage {
        &self.message
    }

    pub async fn state(&self, owner: &str) -> FormState {
        if self.sessions.has_session(owner).await {
            if self.sessions.is_complete(owner).await {
                FormState::ReadyToSubmit
            } else {
                FormState::InProgress
            }
        } else if self.submitted.lock().await.contains(owner) {
            FormState::Submitted
        } else {
            FormState::NotStarted
        }
    }

    /// Handle one inbound event and return the owner's resulting state.
    pub async fn handle(&self, event: ChatEvent) -> Result<FormState, ChatError> {
        match event {
            ChatEvent::ButtonPressed {
                interaction,
                custom_id,
            } => {
                if custom_id == FINISH_ID {
                    return self.finish(&interaction).await;
                }
                match self.layout.field(&custom_id) {
                    Some(field) if field.kind == FieldKind::ShortText => {
                        self.chat
                            .respond(&interaction, InteractionReply::OpenModal(text_modal(&field.id)))
                            .await?;
                    }
                    _ => {
                        debug!(component = %custom_id, "ignoring press on unknown button");
                        self.chat
                            .respond(&interaction, InteractionReply::DeferUpdate)
                            .await?;
                    }
                }
                Ok(self.state(&interaction.user.id).await)
            }
            ChatEvent::OptionSelected {
                interaction,
                custom_id,
                values,
            } => match values.into_iter().next() {
                Some(value) => self.answer(&interaction, &custom_id, &value).await,
                None => self.ignore(&interaction).await,
            },
            ChatEvent::ModalSubmitted {
                interaction,
                custom_id,
                mut values,
            } => {
                let Some(field) = custom_id.strip_prefix(TEXT_MODAL_PREFIX) else {
                    debug!(modal = %custom_id, "ignoring unknown modal");
                    return self.ignore(&interaction).await;
                };
                match values.remove(field) {
                    Some(text) => self.answer(&interaction, field, &text).await,
                    None => self.ignore(&interaction).await,
                }
            }
        }
    }

    async fn ignore(&self, interaction: &Interaction) -> Result<FormState, ChatError> {
        self.chat
            .respond(interaction, InteractionReply::DeferUpdate)
            .await?;
        Ok(self.state(&interaction.user.id).await)
    }

    async fn answer(
        &self,
        interaction: &Interaction,
        field: &str,
        value: &str,
    ) -> Result<FormState, ChatError> {
        let owner = &interaction.user.id;
        let outcome = match self.sessions.record_answer(owner, field, value).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%err, owner = %owner, "answer rejected");
                return self.ignore(interaction).await;
            }
        };
        self.submitted.lock().await.remove(owner);
        debug!(owner = %owner, field = %field, "answer recorded");

        // Refresh even when the acknowledgement fails; the answer is stored.
        let ack = self
            .chat
            .respond(interaction, InteractionReply::DeferUpdate)
            .await;
        if outcome.completeness_changed() {
            if let Err(err) = self.refresh(interaction, outcome.is_complete).await {
                warn!(?err, owner = %owner, "could not refresh form message");
            }
        }
        ack?;
        Ok(self.state(owner).await)
    }

    /// Read-modify-write of the form message components.
    async fn refresh(&self, interaction: &Interaction, ready: bool) -> Result<(), ChatError> {
        let current = match &interaction.message {
            Some(message) => Some(message.clone()),
            None => {
                self.chat
                    .fetch_message(&self.message.channel_id, &self.message.message_id)
                    .await?
            }
        };
        let MessageRef {
            channel_id,
            message_id,
            rows,
        } = current.unwrap_or_else(|| MessageRef {
            channel_id: self.message.channel_id.clone(),
            message_id: self.message.message_id.clone(),
            rows: self.layout.rows.clone(),
        });
        let answers = self.sessions.answers(&interaction.user.id).await;
        let rows = apply_selections(&rows, &answers, ready);
        self.chat
            .edit_components(&channel_id, &message_id, &rows)
            .await
    }

    async fn finish(&self, interaction: &Interaction) -> Result<FormState, ChatError> {
        let owner = &interaction.user.id;
        let answers = match self.sessions.drain_complete(owner).await {
            DrainOutcome::NoSession => {
                self.chat
                    .respond(
                        interaction,
                        InteractionReply::Private(self.messages.not_started_text.clone()),
                    )
                    .await?;
                return Ok(self.state(owner).await);
            }
            DrainOutcome::Incomplete { answered, required } => {
                debug!(owner = %owner, answered, required, "finish pressed on incomplete form");
                self.chat
                    .respond(
                        interaction,
                        InteractionReply::Private(self.messages.incomplete_text.clone()),
                    )
                    .await?;
                return Ok(FormState::InProgress);
            }
            DrainOutcome::Drained(answers) => answers,
        };

        if let Err(err) = self
            .chat
            .respond(interaction, InteractionReply::DeferPrivate)
            .await
        {
            self.sessions.restore(owner, answers).await;
            return Err(err);
        }

        let mut record = answers.clone();
        record.insert(self.layout.title_field.clone(), interaction.user.tag.clone());
        match self.submitter.submit(&record).await {
            Ok(submission) => {
                info!(
                    owner = %owner,
                    record = %submission.record_id,
                    dropped = ?submission.dropped_fields(),
                    "report submitted"
                );
                self.submitted.lock().await.insert(owner);
                self.chat
                    .follow_up_private(interaction, &self.messages.submitted_text)
                    .await?;
                Ok(FormState::Submitted)
            }
            Err(err) => {
                warn!(?err, owner = %owner, "report submission failed");
                self.sessions.restore(owner, answers).await;
                self.chat
                    .follow_up_private(interaction, &self.messages.failure_text)
                    .await?;
                Ok(self.state(owner).await)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeChat, FakeWorkspace, database, interaction, property, select_property,
    };
    use reportbridge_notion::PropertyValue;

    fn schema() -> SchemaSnapshot {
        SchemaSnapshot::from_database(
            "reports",
            &database(
                "reports",
                vec![
                    property("Name", "title"),
                    select_property("Severity", &["Low", "High"]),
                    property("Repro", "rich_text"),
                ],
            ),
        )
    }

    struct Harness {
        form: FormController,
        chat: Arc<FakeChat>,
        workspace: Arc<FakeWorkspace>,
    }

    fn harness() -> Harness {
        let chat = Arc::new(FakeChat::default());
        let workspace = Arc::new(FakeWorkspace::default());
        workspace.put_database(database(
            "reports",
            vec![
                property("Name", "title"),
                select_property("Severity", &["Low", "High"]),
                property("Repro", "rich_text"),
            ],
        ));
        let form = FormController::new(
            chat.clone(),
            RecordSubmitter::new(workspace.clone(), "reports"),
            FormLayout::build(&schema()),
            MessagesConfig::default(),
            FormMessage {
                channel_id: "reports-channel".into(),
                message_id: "msg-1".into(),
            },
        );
        Harness {
            form,
            chat,
            workspace,
        }
    }

    fn from_form(user: &str, form: &FormController) -> Interaction {
        Interaction {
            message: Some(MessageRef {
                channel_id: "reports-channel".into(),
                message_id: "msg-1".into(),
                rows: form.layout().rows.clone(),
            }),
            ..interaction(user)
        }
    }

    fn press(user: &str, form: &FormController, id: &str) -> ChatEvent {
        ChatEvent::ButtonPressed {
            interaction: from_form(user, form),
            custom_id: id.into(),
        }
    }

    fn select(user: &str, form: &FormController, id: &str, value: &str) -> ChatEvent {
        ChatEvent::OptionSelected {
            interaction: from_form(user, form),
            custom_id: id.into(),
            values: vec![value.into()],
        }
    }

    fn modal(user: &str, form: &FormController, field: &str, text: &str) -> ChatEvent {
        ChatEvent::ModalSubmitted {
            interaction: from_form(user, form),
            custom_id: format!("{TEXT_MODAL_PREFIX}{field}"),
            values: HashMap::from([(field.to_string(), text.to_string())]),
        }
    }

    fn finish_button_of(rows: &[ActionRow]) -> Button {
        rows.iter()
            .flat_map(|row| &row.components)
            .find_map(|component| match component {
                Component::Button(button) if button.custom_id == FINISH_ID => Some(button.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn layout_renders_each_interactive_kind() {
        let snapshot = SchemaSnapshot::from_database(
            "db",
            &database(
                "db",
                vec![
                    property("Name", "title"),
                    property("Blocker", "checkbox"),
                    select_property("Severity", &["Low", "High"]),
                    property("Repro", "rich_text"),
                    property("Estimate", "number"),
                ],
            ),
        );
        let layout = FormLayout::build(&snapshot);
        assert_eq!(
            layout.required_fields().collect::<Vec<_>>(),
            vec!["Blocker", "Repro", "Severity"]
        );
        assert_eq!(layout.title_field, "Name");
        assert_eq!(layout.rows.len(), 3);

        let Component::Select(blocker) = &layout.rows[0].components[0] else {
            panic!("expected select");
        };
        let values: Vec<_> = blocker.options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["yes", "no"]);

        let buttons = &layout.rows[2].components;
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].custom_id(), "Repro");
        assert!(finish_button_of(&layout.rows).disabled);
    }

    #[test]
    fn layout_respects_the_row_limit() {
        let mut properties: Vec<_> = (0..6)
            .map(|idx| select_property(&format!("Select{idx}"), &["a"]))
            .collect();
        properties.push(property("Notes", "rich_text"));
        let snapshot = SchemaSnapshot::from_database("db", &database("db", properties));
        let layout = FormLayout::build(&snapshot);

        assert_eq!(layout.rows.len(), MAX_ROWS);
        assert_eq!(layout.fields.len(), 5);
        assert!(layout.field("Select5").is_none());
        assert!(layout.field("Notes").is_some());
    }

    #[test]
    fn apply_selections_keeps_other_components() {
        let layout = FormLayout::build(&schema());
        let answers = HashMap::from([("Severity".to_string(), "High".to_string())]);
        let rows = apply_selections(&layout.rows, &answers, true);

        let Component::Select(severity) = &rows[0].components[0] else {
            panic!("expected select");
        };
        assert_eq!(severity.selected(), Some("High"));
        assert!(!finish_button_of(&rows).disabled);
        assert_eq!(rows[1].components[0], layout.rows[1].components[0]);
    }

    #[tokio::test]
    async fn finish_before_any_answer_is_rejected() {
        let h = harness();
        let state = h.form.handle(press("u1", &h.form, FINISH_ID)).await.unwrap();
        assert_eq!(state, FormState::NotStarted);
        assert_eq!(
            h.chat.replies(),
            vec![(
                "u1".to_string(),
                InteractionReply::Private(MessagesConfig::default().not_started_text)
            )]
        );
        assert!(h.workspace.created().is_empty());
    }

    #[tokio::test]
    async fn full_report_flow() {
        let h = harness();
        let form = &h.form;

        let state = form.handle(select("u1", form, "Severity", "High")).await.unwrap();
        assert_eq!(state, FormState::InProgress);
        assert!(h.chat.edits().is_empty());

        let state = form.handle(press("u1", form, FINISH_ID)).await.unwrap();
        assert_eq!(state, FormState::InProgress);

        form.handle(press("u1", form, "Repro")).await.unwrap();
        let state = form.handle(modal("u1", form, "Repro", "click twice")).await.unwrap();
        assert_eq!(state, FormState::ReadyToSubmit);

        let edits = h.chat.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, "reports-channel");
        assert_eq!(edits[0].1, "msg-1");
        assert!(!finish_button_of(&edits[0].2).disabled);

        let state = form.handle(press("u1", form, FINISH_ID)).await.unwrap();
        assert_eq!(state, FormState::Submitted);
        assert_eq!(form.state("u1").await, FormState::Submitted);

        let replies: Vec<_> = h.chat.replies().into_iter().map(|(_, r)| r).collect();
        assert_eq!(
            replies,
            vec![
                InteractionReply::DeferUpdate,
                InteractionReply::Private(MessagesConfig::default().incomplete_text),
                InteractionReply::OpenModal(text_modal("Repro")),
                InteractionReply::DeferUpdate,
                InteractionReply::DeferPrivate,
            ]
        );
        assert_eq!(
            h.chat.follow_ups(),
            vec![("u1".to_string(), "Report submitted!".to_string())]
        );

        let created = h.workspace.created();
        assert_eq!(created.len(), 1);
        let (_, properties) = &created[0];
        assert_eq!(properties["Name"], PropertyValue::Title("u1#0001".into()));
        assert_eq!(properties["Repro"], PropertyValue::RichText("click twice".into()));
        assert!(matches!(&properties["Severity"], PropertyValue::Select(o) if o.name == "High"));

        let state = form.handle(press("u1", form, FINISH_ID)).await.unwrap();
        assert_eq!(state, FormState::Submitted);
        assert_eq!(h.workspace.created().len(), 1);
    }

    #[tokio::test]
    async fn owners_fill_forms_independently() {
        let h = harness();
        let form = &h.form;
        form.handle(select("u1", form, "Severity", "Low")).await.unwrap();
        form.handle(select("u2", form, "Severity", "High")).await.unwrap();
        form.handle(modal("u2", form, "Repro", "b")).await.unwrap();

        assert_eq!(form.state("u1").await, FormState::InProgress);
        assert_eq!(form.state("u2").await, FormState::ReadyToSubmit);
        assert_eq!(form.sessions().answers("u1").await["Severity"], "Low");
    }

    #[tokio::test]
    async fn failed_submission_keeps_answers_for_retry() {
        let h = harness();
        let form = &h.form;
        h.workspace.fail_create(true);
        form.handle(select("u1", form, "Severity", "Low")).await.unwrap();
        form.handle(modal("u1", form, "Repro", "steps")).await.unwrap();

        let state = form.handle(press("u1", form, FINISH_ID)).await.unwrap();
        assert_eq!(state, FormState::ReadyToSubmit);
        assert_eq!(
            h.chat.follow_ups()[0].1,
            MessagesConfig::default().failure_text
        );

        h.workspace.fail_create(false);
        let state = form.handle(press("u1", form, FINISH_ID)).await.unwrap();
        assert_eq!(state, FormState::Submitted);
        assert_eq!(h.workspace.created().len(), 1);
    }

    #[tokio::test]
    async fn refresh_falls_back_to_fetching_the_form_message() {
        let h = harness();
        let form = &h.form;
        h.chat.put_message(MessageRef {
            channel_id: "reports-channel".into(),
            message_id: "msg-1".into(),
            rows: form.layout().rows.clone(),
        });
        form.handle(select("u1", form, "Severity", "Low")).await.unwrap();
        form.handle(ChatEvent::ModalSubmitted {
            interaction: interaction("u1"),
            custom_id: "text_Repro".into(),
            values: HashMap::from([("Repro".to_string(), "x".to_string())]),
        })
        .await
        .unwrap();

        let edits = h.chat.edits();
        assert_eq!(edits.len(), 1);
        let Component::Select(severity) = &edits[0].2[0].components[0] else {
            panic!("expected select");
        };
        assert_eq!(severity.selected(), Some("Low"));
    }

    #[tokio::test]
    async fn unknown_components_are_acknowledged_and_ignored() {
        let h = harness();
        let form = &h.form;
        let state = form.handle(select("u1", form, "Estimate", "3")).await.unwrap();
        assert_eq!(state, FormState::NotStarted);
        form.handle(press("u1", form, "Severity")).await.unwrap();
        assert_eq!(
            h.chat.replies(),
            vec![
                ("u1".to_string(), InteractionReply::DeferUpdate),
                ("u1".to_string(), InteractionReply::DeferUpdate),
            ]
        );
    }

    #[tokio::test]
    async fn failed_finish_acknowledgement_keeps_the_session() {
        let h = harness();
        let form = &h.form;
        form.handle(select("u1", form, "Severity", "High")).await.unwrap();
        form.handle(modal("u1", form, "Repro", "steps")).await.unwrap();
        assert_eq!(form.state("u1").await, FormState::ReadyToSubmit);

        h.chat.fail_replies(true);
        assert!(form.handle(press("u1", form, FINISH_ID)).await.is_err());
        assert_eq!(form.state("u1").await, FormState::ReadyToSubmit);
        assert_eq!(form.sessions().answers("u1").await.len(), 2);
        assert!(h.workspace.created().is_empty());

        h.chat.fail_replies(false);
        let state = form.handle(press("u1", form, FINISH_ID)).await.unwrap();
        assert_eq!(state, FormState::Submitted);
        assert_eq!(h.workspace.created().len(), 1);
    }

    #[tokio::test]
    async fn failed_answer_acknowledgement_still_refreshes_the_form() {
        let h = harness();
        let form = &h.form;
        form.handle(select("u1", form, "Severity", "High")).await.unwrap();

        h.chat.fail_replies(true);
        assert!(form.handle(modal("u1", form, "Repro", "steps")).await.is_err());
        assert_eq!(form.state("u1").await, FormState::ReadyToSubmit);
        let edits = h.chat.edits();
        assert_eq!(edits.len(), 1);
        assert!(!finish_button_of(&edits[0].2).disabled);
    }

    #[test]
    fn submitted_owners_are_bounded() {
        let mut recent = RecentSubmitters::new(2);
        recent.insert("u1");
        recent.insert("u2");
        recent.insert("u2");
        recent.insert("u3");
        assert!(!recent.contains("u1"));
        assert!(recent.contains("u2"));
        assert!(recent.contains("u3"));

        recent.remove("u2");
        recent.insert("u4");
        assert!(recent.contains("u3"));
        assert!(recent.contains("u4"));
        assert_eq!(recent.order.len(), 2);
    }
}
