//! Pure cursor arithmetic over a schema.
//!
//! Nothing here mutates state; the reducer in [`super::draft`] composes
//! these functions into transitions.

use serde::{Deserialize, Serialize};

use crate::schema::{Answers, RATING_PAGE_SIZE, SurveySchema};

/// Position inside the survey.
///
/// `question` is meaningful for sequential question sections only;
/// `rating_page` for rating groups only. Both reset to 0 on section change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub section: usize,
    pub question: usize,
    pub rating_page: usize,
}

impl Cursor {
    pub fn start_of(section: usize) -> Self {
        Self {
            section,
            question: 0,
            rating_page: 0,
        }
    }
}

/// Where the respondent is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Intro,
    Section(Cursor),
    Completed,
}

/// Result of a structural forward step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    To(Cursor),
    /// No further position: the next step is submission.
    Finish,
}

/// Result of a structural backward step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backward {
    To(Cursor),
    Intro,
}

/// Next position ignoring skip rules.
pub fn forward_target(schema: &SurveySchema, cursor: Cursor) -> Forward {
    let Some(section) = schema.section(cursor.section) else {
        return Forward::Finish;
    };

    if section.is_rating_group() {
        if cursor.rating_page + 1 < section.rating_page_count() {
            return Forward::To(Cursor {
                rating_page: cursor.rating_page + 1,
                ..cursor
            });
        }
    } else if !section.is_table() && cursor.question + 1 < section.questions().len() {
        return Forward::To(Cursor {
            question: cursor.question + 1,
            rating_page: 0,
            ..cursor
        });
    }

    if cursor.section + 1 < schema.sections.len() {
        Forward::To(Cursor::start_of(cursor.section + 1))
    } else {
        Forward::Finish
    }
}

/// Whether the cursor rests on a question hidden by a skip rule.
///
/// Rating pages and table sections are never skippable as a whole.
pub fn is_skippable(schema: &SurveySchema, cursor: Cursor, answers: &Answers) -> bool {
    let Some(section) = schema.section(cursor.section) else {
        return false;
    };
    if section.is_table() {
        return false;
    }
    section
        .questions()
        .get(cursor.question)
        .is_some_and(|q| schema.should_skip(&q.id, answers))
}

/// Move past every consecutive hidden question, cascading into following
/// sections. In the last section with nothing visible left the cursor
/// stays put.
pub fn skip_hidden(schema: &SurveySchema, cursor: Cursor, answers: &Answers) -> Cursor {
    let mut cursor = cursor;
    loop {
        if !is_skippable(schema, cursor, answers) {
            return cursor;
        }
        let questions = schema.sections[cursor.section].questions();
        let next_visible = (cursor.question + 1..questions.len())
            .find(|&q| !schema.should_skip(&questions[q].id, answers));
        if let Some(question) = next_visible {
            return Cursor { question, ..cursor };
        }
        if cursor.section + 1 < schema.sections.len() {
            cursor = Cursor::start_of(cursor.section + 1);
        } else {
            return cursor;
        }
    }
}

/// Previous position when the history stack has nothing usable.
pub fn structural_back(schema: &SurveySchema, cursor: Cursor, answers: &Answers) -> Backward {
    let Some(section) = schema.section(cursor.section) else {
        return Backward::Intro;
    };

    if section.is_rating_group() && cursor.rating_page > 0 {
        return Backward::To(Cursor {
            rating_page: cursor.rating_page - 1,
            ..cursor
        });
    }

    if !section.is_rating_group() && !section.is_table() {
        let questions = section.questions();
        let previous = (0..cursor.question.min(questions.len()))
            .rev()
            .find(|&q| !schema.should_skip(&questions[q].id, answers));
        if let Some(question) = previous {
            return Backward::To(Cursor { question, ..cursor });
        }
    }

    (0..cursor.section)
        .rev()
        .find_map(|s| last_visible(schema, s, answers))
        .map_or(Backward::Intro, Backward::To)
}

/// Last position of a section that a respondent would actually see.
fn last_visible(schema: &SurveySchema, section: usize, answers: &Answers) -> Option<Cursor> {
    let s = schema.section(section)?;
    if s.is_rating_group() {
        return Some(Cursor {
            rating_page: s.rating_page_count().saturating_sub(1),
            ..Cursor::start_of(section)
        });
    }
    if s.is_table() {
        return Some(Cursor::start_of(section));
    }
    s.questions()
        .iter()
        .rposition(|q| !schema.should_skip(&q.id, answers))
        .map(|question| Cursor {
            question,
            ..Cursor::start_of(section)
        })
}

/// Completion percentage in `0..=100`.
///
/// Sections before the cursor count in full; the current section counts
/// the rating items up to the end of the current page, or the questions up
/// to and including the current one.
pub fn progress(schema: &SurveySchema, stage: Stage) -> u8 {
    let cursor = match stage {
        Stage::Intro => return 0,
        Stage::Completed => return 100,
        Stage::Section(cursor) => cursor,
    };

    let total = schema.total_prompts();
    if total == 0 {
        return 0;
    }

    let before: usize = schema
        .sections
        .iter()
        .take(cursor.section)
        .map(|s| s.prompt_count())
        .sum();
    let current = schema.section(cursor.section).map_or(0, |s| {
        let n = s.prompt_count();
        if s.is_rating_group() {
            n.min((cursor.rating_page + 1) * RATING_PAGE_SIZE)
        } else {
            n.min(cursor.question + 1)
        }
    });

    let pct = ((before + current) as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}
