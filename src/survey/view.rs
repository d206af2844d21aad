//! What the respondent should be looking at, derived from a draft.

use crate::schema::{AnswerValue, Answers, Question, RatingItem, Section, SurveySchema};
use crate::survey::draft::DraftState;
use crate::survey::navigation::{Stage, progress};

const NPS_LOVE: &str =
    "Wow! Such love for a CRM is unheard of. Would love to know more in subsequent questions.";
const NPS_PAINFUL: &str = "Got it — sounds painful. Let’s first confirm which CRM you’re using.";
const NPS_FRICTION: &str = "Noted — some friction there. Which CRM are you on right now?";

/// Renderable state of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen<'a> {
    Intro {
        title: &'a str,
    },
    Question {
        section: &'a Section,
        question: &'a Question,
        /// 1-based position inside the section.
        number: usize,
        of: usize,
        answer: Option<&'a AnswerValue>,
        messages: &'a [String],
        context: Option<&'static str>,
    },
    RatingPage {
        section: &'a Section,
        items: &'a [RatingItem],
        page: usize,
        pages: usize,
        scale: (u8, u8),
    },
    Table {
        section: &'a Section,
        questions: &'a [Question],
    },
    Completed,
}

/// Screen plus the progress bar value.
#[derive(Debug, Clone, PartialEq)]
pub struct View<'a> {
    pub screen: Screen<'a>,
    pub progress: u8,
    pub ack: Option<&'a str>,
}

pub fn view<'a>(schema: &'a SurveySchema, state: &'a DraftState) -> View<'a> {
    View {
        screen: screen(schema, state),
        progress: progress(schema, state.stage),
        ack: state.ack.as_deref(),
    }
}

fn screen<'a>(schema: &'a SurveySchema, state: &'a DraftState) -> Screen<'a> {
    let cursor = match state.stage {
        Stage::Intro => {
            return Screen::Intro {
                title: &schema.metadata.title,
            };
        }
        Stage::Completed => return Screen::Completed,
        Stage::Section(cursor) => cursor,
    };
    let Some(section) = schema.section(cursor.section) else {
        return Screen::Completed;
    };

    if let Some(scale) = section.rating_scale() {
        return Screen::RatingPage {
            section,
            items: section.rating_page(cursor.rating_page),
            page: cursor.rating_page,
            pages: section.rating_page_count(),
            scale,
        };
    }
    if section.is_table() {
        return Screen::Table {
            section,
            questions: section.questions(),
        };
    }

    let questions = section.questions();
    match questions.get(cursor.question) {
        Some(question) => Screen::Question {
            section,
            question,
            number: cursor.question + 1,
            of: questions.len(),
            answer: state.answers.get(&question.id),
            messages: state.messages_for(&question.id),
            context: context_prefix(&question.id, &state.answers),
        },
        None => Screen::Completed,
    }
}

/// Coaching line shown above a question, keyed off earlier answers.
pub fn context_prefix(question_id: &str, answers: &Answers) -> Option<&'static str> {
    if question_id != "current_crm" {
        return None;
    }
    let nps = answers.get("nps")?.as_number()?;
    if nps >= 9.0 {
        Some(NPS_LOVE)
    } else if nps <= 3.0 {
        Some(NPS_PAINFUL)
    } else if nps <= 6.0 {
        Some(NPS_FRICTION)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::crm_pain_points;
    use crate::survey::navigation::Cursor;

    fn with_nps(nps: f64) -> Answers {
        Answers::from([("nps".to_string(), AnswerValue::from(nps))])
    }

    #[test]
    fn context_prefix_follows_nps_bands() {
        assert_eq!(context_prefix("current_crm", &with_nps(10.0)), Some(NPS_LOVE));
        assert_eq!(context_prefix("current_crm", &with_nps(2.0)), Some(NPS_PAINFUL));
        assert_eq!(context_prefix("current_crm", &with_nps(5.0)), Some(NPS_FRICTION));
        assert_eq!(context_prefix("current_crm", &with_nps(7.0)), None);
        assert_eq!(context_prefix("primary_role", &with_nps(10.0)), None);
        assert_eq!(context_prefix("current_crm", &Answers::new()), None);
    }

    #[test]
    fn screens_follow_stage() {
        let schema = crm_pain_points();
        let mut state = DraftState::default();
        assert!(matches!(view(&schema, &state).screen, Screen::Intro { .. }));
        assert_eq!(view(&schema, &state).progress, 0);

        state.stage = Stage::Section(Cursor {
            question: 1,
            ..Cursor::default()
        });
        state.answers = with_nps(10.0);
        match view(&schema, &state).screen {
            Screen::Question {
                question,
                number,
                context,
                ..
            } => {
                assert_eq!(question.id, "current_crm");
                assert_eq!(number, 2);
                assert_eq!(context, Some(NPS_LOVE));
            }
            other => panic!("expected a question screen, got {other:?}"),
        }

        let ratings = schema
            .sections
            .iter()
            .position(Section::is_rating_group)
            .unwrap();
        state.stage = Stage::Section(Cursor {
            rating_page: 1,
            ..Cursor::start_of(ratings)
        });
        match view(&schema, &state).screen {
            Screen::RatingPage { items, page, pages, scale, .. } => {
                assert_eq!(items.len(), 5);
                assert_eq!((page, pages), (1, 2));
                assert_eq!(scale, (1, 5));
            }
            other => panic!("expected a rating page, got {other:?}"),
        }

        let table = schema.sections.iter().position(Section::is_table).unwrap();
        state.stage = Stage::Section(Cursor::start_of(table));
        assert!(matches!(view(&schema, &state).screen, Screen::Table { .. }));

        state.stage = Stage::Completed;
        assert_eq!(view(&schema, &state).progress, 100);
    }
}
