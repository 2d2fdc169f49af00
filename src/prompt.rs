/// Fixed system instruction used for every request. The model must answer
/// only from the supplied context and decline when the context is not enough.
pub const SYSTEM_INSTRUCTION: &str = "You are a medical assistant for question-answering tasks. \
Use only the pieces of retrieved context below to answer the question. \
If the context does not contain the answer, say that the information is not \
available in the provided context; never make up an answer. \
Use three sentences maximum and keep the answer concise.";

/// Compose the system prompt for one request: the fixed instruction followed
/// by the retrieved context.
pub fn grounded_system_prompt(context: &str) -> String {
    format!("{}\n\nContext:\n{}", SYSTEM_INSTRUCTION, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_carries_instruction_and_context() {
        let prompt = grounded_system_prompt("Aspirin is used to reduce fever and pain.");
        assert!(prompt.starts_with(SYSTEM_INSTRUCTION));
        assert!(prompt.contains("Aspirin is used to reduce fever and pain."));
    }

    #[test]
    fn instruction_demands_grounded_answers() {
        assert!(SYSTEM_INSTRUCTION.contains("only"));
        assert!(SYSTEM_INSTRUCTION.contains("never make up"));
    }
}
