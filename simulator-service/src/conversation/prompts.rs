//! System prompt templates, one per conversation phase.

use super::phase::Phase;

/// Text sent in place of a user message to open a session.
pub const OPENING_MESSAGE: &str = "start conversation";

/// The practice case every session works through.
pub const PRACTICE_SCENARIO: &str = "A student has emailed you, worried because they cannot \
follow their professor's methodology: the explanations go too fast and they do not know how \
to ask for help without seeming inattentive.";

/// Who the assistant is talking to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantProfile {
    pub display_name: String,
    pub role_label: String,
    pub gender_label: String,
}

impl ParticipantProfile {
    pub fn new(
        display_name: impl Into<String>,
        role_label: impl Into<String>,
        gender_label: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            role_label: role_label.into(),
            gender_label: gender_label.into(),
        }
    }

    pub fn system_prompt(&self, phase: Phase) -> String {
        render(phase, &self.display_name, &self.role_label, &self.gender_label)
    }
}

/// Grammatical form used when addressing the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOfAddress {
    Feminine,
    Masculine,
    Neutral,
}

impl FormOfAddress {
    /// Map a free-form gender label. Unknown labels are neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "femenino" | "feminine" | "female" | "f" | "mujer" | "woman" => {
                FormOfAddress::Feminine
            }
            "masculino" | "masculine" | "male" | "m" | "hombre" | "man" => {
                FormOfAddress::Masculine
            }
            _ => FormOfAddress::Neutral,
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            FormOfAddress::Feminine => {
                "Use feminine grammatical forms when addressing the participant (for example \"estimada\" in Spanish)."
            }
            FormOfAddress::Masculine => {
                "Use masculine grammatical forms when addressing the participant (for example \"estimado\" in Spanish)."
            }
            FormOfAddress::Neutral => {
                "Use gender-neutral forms when addressing the participant (for example \"estimade\" in Spanish)."
            }
        }
    }
}

/// Build the system prompt for `phase`.
///
/// Numbers outside 1..=5 use the phase 1 template. The output depends only on
/// the arguments.
pub fn build_system_prompt(
    phase: i64,
    user_name: &str,
    role_label: &str,
    gender_label: &str,
) -> String {
    let phase = Phase::from_number(phase).unwrap_or_default();
    render(phase, user_name, role_label, gender_label)
}

fn render(phase: Phase, user_name: &str, role_label: &str, gender_label: &str) -> String {
    let header = format!(
        "Participant: {user_name}, {role_label}.\n{address}\n\
         Reply in plain conversational text without markdown formatting.",
        address = FormOfAddress::from_label(gender_label).instruction(),
    );

    let body = match phase {
        Phase::Greeting => format!(
            "You are Alex, an educational assistant specialised in artificial intelligence for \
             academic communication.\n\n\
             Greet {user_name} warmly and introduce yourself briefly. Then ask what name they \
             would prefer you to use so the session feels personal.\n\n\
             Keep a professional but approachable tone. Do not include technical instructions \
             or implementation examples in your reply.\n\n\
             Respond naturally and conversationally."
        ),
        Phase::Concepts => format!(
            "You are still Alex. {user_name} ({role_label}) has just told you their preferred \
             name.\n\n\
             Thank them and use that name. Explain briefly that this is \"Session 1: Entry \
             Activity\", where they will learn to use artificial intelligence for academic \
             communication.\n\n\
             Then explain the characteristics of an effective prompt:\n\
             - Clarity: be specific and direct\n\
             - Context: provide the relevant information\n\
             - Objective: state what you want to achieve\n\
             - Format: specify the kind of response expected\n\
             - Tone: indicate the communication style\n\n\
             Mention that the concrete goal is to write an email answering a student who is \
             asking about their professor's methodology. The practice scenario: \
             {PRACTICE_SCENARIO}\n\n\
             Respond naturally, without technical instructions."
        ),
        Phase::Practice => format!(
            "You are still Alex. {user_name} ({role_label}) already knows the characteristics \
             of an effective prompt.\n\n\
             Now present the practice scenario: {PRACTICE_SCENARIO}\n\n\
             Ask {user_name} to write a prompt that generates a reply email which is \
             empathetic, professional, offers concrete solutions and preserves academic \
             authority.\n\n\
             Guide the construction of the prompt step by step if needed."
        ),
        Phase::Feedback => format!(
            "You are still Alex. {user_name} ({role_label}) has written a prompt.\n\n\
             Critique the proposed prompt and give constructive feedback. If it is well \
             structured, congratulate them. If it needs work, suggest specific adjustments.\n\n\
             Once the prompt is well formed, use it to generate an example reply email to the \
             student.\n\n\
             Respond naturally and educationally."
        ),
        Phase::Closing => format!(
            "You are still Alex. It is time to close the session with {user_name} \
             ({role_label}).\n\n\
             Recap what was covered and highlight what went well. Ask what was most useful and \
             how they could apply effective prompts in their daily work.\n\n\
             Offer final advice for working with AI going forward and close on a motivating \
             note.\n\n\
             Respond naturally and encouragingly."
        ),
    };

    format!("{body}\n\n{header}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "María";
    const ROLE: &str = "Academic Coordinator";
    const GENDER: &str = "femenino";

    #[test]
    fn every_phase_mentions_name_and_role() {
        for phase in 1..=5 {
            let prompt = build_system_prompt(phase, NAME, ROLE, GENDER);
            assert!(!prompt.trim().is_empty());
            assert!(prompt.contains(NAME), "phase {phase} lacks the name");
            assert!(prompt.contains(ROLE), "phase {phase} lacks the role");
        }
    }

    #[test]
    fn prompts_are_deterministic() {
        for phase in 1..=5 {
            assert_eq!(
                build_system_prompt(phase, NAME, ROLE, GENDER),
                build_system_prompt(phase, NAME, ROLE, GENDER)
            );
        }
    }

    #[test]
    fn phases_have_distinct_templates() {
        let prompts: Vec<String> = (1..=5)
            .map(|phase| build_system_prompt(phase, NAME, ROLE, GENDER))
            .collect();
        for (i, a) in prompts.iter().enumerate() {
            for b in prompts.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn out_of_range_falls_back_to_greeting() {
        let greeting = build_system_prompt(1, NAME, ROLE, GENDER);
        assert_eq!(build_system_prompt(0, NAME, ROLE, GENDER), greeting);
        assert_eq!(build_system_prompt(6, NAME, ROLE, GENDER), greeting);
        assert_eq!(build_system_prompt(-3, NAME, ROLE, GENDER), greeting);
    }

    #[test]
    fn concepts_phase_carries_checklist_and_scenario() {
        let prompt = build_system_prompt(2, NAME, ROLE, GENDER);
        for attribute in ["Clarity", "Context", "Objective", "Format", "Tone"] {
            assert!(prompt.contains(attribute), "missing {attribute}");
        }
        assert!(prompt.contains("professor"));
    }

    #[test]
    fn practice_phase_lists_email_constraints() {
        let prompt = build_system_prompt(3, NAME, ROLE, GENDER);
        for constraint in ["empathetic", "professional", "concrete solutions", "academic authority"] {
            assert!(prompt.contains(constraint), "missing {constraint}");
        }
    }

    #[test]
    fn feedback_and_closing_phases_follow_their_script() {
        let feedback = build_system_prompt(4, NAME, ROLE, GENDER);
        assert!(feedback.contains("Critique"));
        assert!(feedback.contains("example reply email"));

        let closing = build_system_prompt(5, NAME, ROLE, GENDER);
        assert!(closing.contains("Recap"));
        assert!(closing.contains("advice"));
    }

    #[test]
    fn gender_label_selects_form_of_address() {
        assert_eq!(FormOfAddress::from_label("Femenino"), FormOfAddress::Feminine);
        assert_eq!(FormOfAddress::from_label("male"), FormOfAddress::Masculine);
        assert_eq!(FormOfAddress::from_label("neutro"), FormOfAddress::Neutral);
        assert_eq!(FormOfAddress::from_label(""), FormOfAddress::Neutral);

        assert!(build_system_prompt(1, NAME, ROLE, "femenino").contains("estimada"));
        assert!(build_system_prompt(1, NAME, ROLE, "masculino").contains("estimado"));
        assert!(build_system_prompt(1, NAME, ROLE, "other").contains("estimade"));
    }

    #[test]
    fn profile_renders_same_text_as_builder() {
        let profile = ParticipantProfile::new(NAME, ROLE, GENDER);
        assert_eq!(
            profile.system_prompt(Phase::Feedback),
            build_system_prompt(4, NAME, ROLE, GENDER)
        );
    }
}
