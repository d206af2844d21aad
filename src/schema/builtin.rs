//! The CRM pain-points survey shipped with the service.

use super::{
    FieldKind, Question, RatingItem, RespondentField, Section, SectionBody,
    SectionLayout, SkipCondition, SkipRule, SurveyMetadata, SurveySchema,
};

use super::QuestionKind::{LongText, MultiSelect, MultipleChoice, Number, Scale};

const CONCEPT_OPTIONS: &[(&str, &str)] = &[
    ("love", "Love it"),
    ("might", "Might need it"),
    ("dont_need", "Don't need"),
    ("dont_understand", "Don't understand"),
];

/// Option id meaning the respondent has no CRM at all.
pub const NO_CRM: &str = "no_crm";

fn section(id: &str, title: &str, objective: &str, victory: &str, body: SectionBody) -> Section {
    Section {
        id: id.to_string(),
        title: title.to_string(),
        objective: objective.to_string(),
        victory_copy: victory.to_string(),
        body,
    }
}

fn sequential(questions: Vec<Question>) -> SectionBody {
    SectionBody::Questions {
        questions,
        layout: SectionLayout::Sequential,
    }
}

fn item(id: &str, label: &str, description: &str) -> RatingItem {
    RatingItem {
        id: id.to_string(),
        label: label.to_string(),
        description: Some(description.to_string()),
    }
}

fn concept(id: &str, label: &str) -> Question {
    Question::new(id, MultipleChoice, label)
        .options(CONCEPT_OPTIONS)
        .required()
}

fn field(id: &str, label: &str, kind: FieldKind, required: bool) -> RespondentField {
    RespondentField {
        id: id.to_string(),
        label: label.to_string(),
        kind,
        required,
    }
}

/// Build the CRM pain-points survey (`crm-pain-points-v1`).
pub fn crm_pain_points() -> SurveySchema {
    SurveySchema {
        metadata: SurveyMetadata {
            id: "crm-pain-points-v1".to_string(),
            title: "CRM Pain Points Survey".to_string(),
            version: "0.3.0".to_string(),
            source_link: "https://docs.google.com/document/d/1cb1G7e8u_ZiYbQBuAKmYNCsE-RxBOMuc5spMZJ6Sq9U/edit?usp=sharing".to_string(),
        },
        respondent_fields: vec![
            field("full_name", "Full name", FieldKind::Text, true),
            field("email", "Email", FieldKind::Email, true),
            field("company_name", "Company (optional)", FieldKind::Text, false),
        ],
        sections: vec![
            section(
                "about_you",
                "About You",
                "Capture your role and context to interpret responses correctly.",
                "Great context—this helps us tailor insights.",
                sequential(vec![
                    Question::new("nps", Scale, "How happy are you with your current CRM?")
                        .scale(0, 10)
                        .required(),
                    Question::new("current_crm", MultipleChoice, "Which CRM are you using?")
                        .options(&[
                            ("sf", "Salesforce"),
                            ("hs", "HubSpot"),
                            ("pd", "Pipedrive"),
                            ("zoho", "Zoho"),
                            ("monday", "monday.com"),
                            ("fresh", "Freshsales"),
                            (NO_CRM, "I don't use a CRM"),
                            ("other", "Other (specify)"),
                        ])
                        .required(),
                    Question::new("primary_role", MultipleChoice, "Your primary role (pick one)")
                        .options(&[
                            ("sales_bd", "Sales / Business Development"),
                            ("sales_ops", "Sales Ops / RevOps"),
                            ("marketing", "Marketing"),
                            ("founder_clevel", "Founder / C-Level"),
                            ("customer_success", "Customer Success / Account Management"),
                            ("other", "Other (specify)"),
                        ])
                        .required()
                        .explanation("Choose the role that fits you best. If “Other,” provide details inline."),
                    Question::new("seniority", MultipleChoice, "Seniority / decision influence")
                        .options(&[
                            ("daily_user", "Daily user, no purchase influence"),
                            ("team_lead", "Team lead, influences tool selection"),
                            ("dept_head", "Department head, approves budgets"),
                            ("executive", "Executive, final decision maker"),
                        ])
                        .required(),
                    Question::new("licenses_count", MultipleChoice, "Number of CRM licenses")
                        .options(&[
                            ("1_5", "1–5"),
                            ("6_25", "6–25"),
                            ("26_100", "26–100"),
                            ("100_plus", "100+"),
                        ])
                        .required(),
                    Question::new("active_users", Number, "Number of active users")
                        .explanation("Enter a number.")
                        .required(),
                ]),
            ),
            section(
                "daily_routine",
                "Your Daily CRM Routine",
                "Understand time spent, key metrics tracked, and first actions each day.",
                "Daily rhythm captured—on to what you value most.",
                sequential(vec![
                    Question::new(
                        "time_spent",
                        MultipleChoice,
                        "Roughly how much time do you spend in CRM each working day?",
                    )
                    .options(&[
                        ("lt_30", "< 30 min"),
                        ("30_60", "30–60 min"),
                        ("1_2h", "1–2 hrs"),
                        ("gt_2h", "2+ hrs"),
                    ])
                    .required(),
                    Question::new(
                        "top_metrics",
                        LongText,
                        "What are the top metrics you track daily in CRM? (list your top 3)",
                    )
                    .explanation("e.g., Total pipeline value; Total deals; Status of companies")
                    .required(),
                    Question::new(
                        "start_of_day",
                        LongText,
                        "Describe a typical “start-of-day” workflow in CRM",
                    )
                    .explanation("What tabs, lists, or reports do you check first?")
                    .hint("Sample: I open the Deals board to review stuck deals, check the “New leads” list, scan yesterday’s emails on Contact timelines, and glance at the “Meetings this week” dashboard.")
                    .required(),
                ]),
            ),
            section(
                "features_value",
                "Features You Value (CRM Today)",
                "Rate how valuable each feature is to you today (1 = Not valuable, 5 = Mission-critical).",
                "Thanks—clear signal on what matters right now.",
                SectionBody::RatingGroup {
                    scale_min: 1,
                    scale_max: 5,
                    items: vec![
                        item("deal_pipeline", "Deal pipeline board", "Kanban-style view of deals across stages."),
                        item("contact_timeline", "Contact timeline (emails, calls)", "Chronological activity stream per contact."),
                        item("auto_email_logging", "Automatic email logging", "Auto-captures sent/received emails to the right records."),
                        item("sequences", "Sequence / cadence emails", "Automated multi-step outreach for follow-ups."),
                        item("tasks_reminders", "Tasks & reminders", "Create and schedule to-dos for yourself or team."),
                        item("reporting_dashboards", "Reporting dashboards", "Visualize KPIs and trends in configurable widgets."),
                        item("workflow_automation", "Workflow automation", "If-this-then-that rules to auto-assign, update, or notify."),
                        item("meeting_scheduler", "Meeting scheduler", "Share availability links and auto-create events/records."),
                        item("calling", "Calling / call recording", "Place calls from CRM and record with consent."),
                        item("mobile_app", "Mobile app", "Use CRM features on the go."),
                    ],
                },
            ),
            section(
                "feature_cannot_lose",
                "Critical feature",
                "Identify the one feature that must not regress.",
                "Noted—the non-negotiable is clear.",
                sequential(vec![Question::new(
                    "hate_to_lose",
                    LongText,
                    "Which single CRM feature would you hate to lose? Why?",
                )]),
            ),
            section(
                "pain_points_manual",
                "Pain Points & Manual Work",
                "Find repetitive, time-consuming tasks that still happen outside CRM.",
                "Got it—the friction is mapped.",
                sequential(vec![
                    Question::new(
                        "manual_tasks",
                        MultiSelect,
                        "What tasks inside CRM feel repetitive or time-consuming enough that you still do them manually? (check all that apply)",
                    )
                    .options(&[
                        ("contact_research", "Contact/Lead research"),
                        ("ice_breakers", "Writing personalized ice-breaker emails"),
                        ("logging_calls", "Logging calls or meeting notes"),
                        ("updating_deals", "Updating deal stages / close dates"),
                        ("building_reports", "Building or editing reports"),
                        ("importing_data", "Importing data from LinkedIn or other tools"),
                        ("pre_meeting", "Preparing pre-meeting summaries"),
                        ("email_summaries", "Adding email summaries in CRM"),
                        ("data_quality", "Maintaining data quality"),
                        ("campaign_integration", "Integrating campaign data to leads/contacts"),
                        ("other", "Other (specify)"),
                    ])
                    .required(),
                    Question::new(
                        "recent_scenario",
                        LongText,
                        "Describe one recent scenario where CRM got in your way OR required extra steps.",
                    )
                    .required(),
                ]),
            ),
            section(
                "integrations_triggers",
                "Integrations & Triggers",
                "Understand connected tools and where value shows up.",
                "Connections mapped—thank you.",
                sequential(vec![
                    Question::new(
                        "connected_tools",
                        MultiSelect,
                        "Current tools already connected to your CRM (check all)",
                    )
                    .options(&[
                        ("gmail", "Gmail / Google Workspace"),
                        ("outlook", "Outlook / Microsoft 365"),
                        ("slack", "Slack"),
                        ("teams", "Microsoft Teams"),
                        ("calendars", "Calendars (Google / Outlook)"),
                        ("calling_platform", "Calling platform (e.g., Aircall)"),
                        ("marketing_email", "Marketing email provider (SendGrid, Mailgun…)"),
                        ("data_enrichment", "Data enrichment (ZoomInfo, Clearbit…)"),
                        ("other", "Other (specify)"),
                    ])
                    .required(),
                    Question::new(
                        "most_valuable_integration",
                        LongText,
                        "Which integration do you think is the most valuable",
                    )
                    .required(),
                    Question::new(
                        "crm_love",
                        LongText,
                        "What do you really love about your CRM? Something that you can’t live without",
                    )
                    .required(),
                ]),
            ),
            section(
                "invisible_crm",
                "New “Invisible CRM” Concept",
                "Indicate your preference for each concept.",
                "Great—this tells us where to innovate.",
                SectionBody::Questions {
                    layout: SectionLayout::Table,
                    questions: vec![
                        concept("auto_update", "Auto-updating the CRM based on calls, emails"),
                        concept("chatgpt_reports", "ChatGPT-type conversation to ask for reports, contact history"),
                        concept("custom_inbox", "Customized information in your inbox based on what you want every day"),
                        concept("desktop_research", "Desktop research built right into the CRM"),
                        concept("ice_breakers_signals", "Ice breakers and signals to warm up cold leads"),
                        concept("personalized_emails", "Personalized emails based on LinkedIn posts and previous conversations"),
                        concept("workflows_automation", "Workflows to automate your daily repetitive tasks"),
                        concept("daily_tasks", "Your daily tasks—listed, organized and updated in one place"),
                    ],
                },
            ),
            section(
                "closing",
                "Closing",
                "Capture the single biggest frustration and consent for follow-up.",
                "Thank you! Your insights will directly shape the next-generation CRM experience.",
                sequential(vec![
                    Question::new(
                        "magic_wand",
                        LongText,
                        "If you could wave a magic wand and fix one CRM frustration, what would disappear?",
                    ),
                    Question::new(
                        "followup_consent",
                        MultipleChoice,
                        "May we contact you for a 20-minute follow-up call?",
                    )
                    .options(&[("yes", "Yes"), ("no", "No")]),
                ]),
            ),
        ],
        skip_rules: vec![SkipRule {
            when: SkipCondition::AnswerEquals {
                question_id: "current_crm".to_string(),
                value: NO_CRM.to_string(),
            },
            skip: vec![
                "nps".to_string(),
                "licenses_count".to_string(),
                "time_spent".to_string(),
            ],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Answers;

    #[test]
    fn no_crm_hides_usage_questions() {
        let schema = crm_pain_points();
        let mut answers = Answers::new();
        answers.insert("current_crm".into(), NO_CRM.into());
        for id in ["nps", "licenses_count", "time_spent"] {
            assert!(schema.should_skip(id, &answers), "{id} should be hidden");
        }
        assert!(!schema.should_skip("primary_role", &answers));
    }

    #[test]
    fn invisible_crm_is_a_table() {
        let schema = crm_pain_points();
        let table: Vec<_> = schema.sections.iter().filter(|s| s.is_table()).collect();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].id, "invisible_crm");
        assert_eq!(table[0].questions().len(), 8);
    }

    #[test]
    fn active_users_is_numeric() {
        let schema = crm_pain_points();
        assert_eq!(schema.question("active_users").map(|q| q.kind), Some(Number));
    }
}
