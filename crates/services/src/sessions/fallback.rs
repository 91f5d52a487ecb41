use rand::rng;
use rand::seq::SliceRandom;

use prep_core::model::{Alternative, Question, QuestionId};

// Ids far above the bank's range so a fallback question can never collide
// with a real one in the answer log.
const FALLBACK_ID_BASE: u64 = 900_000;

fn sample(id_offset: u64, subject: &str, prompt: &str, correct: &str, options: [(&str, &str); 4]) -> Question {
    let alternatives = options
        .into_iter()
        .map(|(label, text)| Alternative {
            label: label.to_string(),
            text: text.to_string(),
        })
        .collect();
    Question::new(
        QuestionId::new(FALLBACK_ID_BASE + id_offset),
        subject,
        None,
        prompt,
        alternatives,
        correct,
        None,
        None,
        None,
        None,
        None,
        Vec::new(),
        Vec::new(),
    )
    .expect("built-in question set is valid")
}

/// The built-in question set used when free practice cannot reach the bank
/// or the filters match nothing.
pub(crate) fn builtin_questions() -> Vec<Question> {
    vec![
        sample(
            1,
            "Direito Constitucional",
            "Segundo a Constituição Federal, são direitos sociais, EXCETO:",
            "D",
            [
                ("A", "a educação"),
                ("B", "a saúde"),
                ("C", "o trabalho"),
                ("D", "a propriedade privada"),
            ],
        ),
        sample(
            2,
            "Direito Constitucional",
            "O mandado de segurança será concedido para proteger direito líquido e certo quando o responsável pela ilegalidade for:",
            "C",
            [
                ("A", "apenas autoridade federal"),
                ("B", "apenas pessoa jurídica de direito privado"),
                ("C", "autoridade pública ou agente de pessoa jurídica no exercício de atribuições do Poder Público"),
                ("D", "qualquer particular"),
            ],
        ),
        sample(
            3,
            "Direito Administrativo",
            "A administração pública direta e indireta obedecerá, entre outros, aos princípios de:",
            "A",
            [
                ("A", "legalidade, impessoalidade, moralidade, publicidade e eficiência"),
                ("B", "legalidade, pessoalidade, moralidade, publicidade e eficiência"),
                ("C", "legitimidade, impessoalidade, moralidade, sigilo e eficiência"),
                ("D", "legalidade, impessoalidade, amoralidade, publicidade e economia"),
            ],
        ),
        sample(
            4,
            "Português",
            "Assinale a alternativa em que a concordância verbal está correta:",
            "B",
            [
                ("A", "Fazem dois anos que ele partiu."),
                ("B", "Faz dois anos que ele partiu."),
                ("C", "Houveram muitos problemas na prova."),
                ("D", "Existe muitos candidatos inscritos."),
            ],
        ),
        sample(
            5,
            "Raciocínio Lógico",
            "Se todo A é B e algum B é C, então:",
            "D",
            [
                ("A", "todo A é C"),
                ("B", "nenhum A é C"),
                ("C", "algum A é necessariamente C"),
                ("D", "nada se pode concluir sobre A e C"),
            ],
        ),
    ]
}

/// A shuffled fallback set capped at `count` questions.
pub(crate) fn fallback_set(count: u32) -> Vec<Question> {
    let mut questions = builtin_questions();
    questions.shuffle(&mut rng());
    questions.truncate(count as usize);
    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set_is_valid_and_distinct() {
        let questions = builtin_questions();
        assert!(!questions.is_empty());
        let mut ids: Vec<_> = questions.iter().map(Question::id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), questions.len());
    }

    #[test]
    fn fallback_set_respects_count() {
        assert_eq!(fallback_set(2).len(), 2);
        assert_eq!(fallback_set(100).len(), builtin_questions().len());
    }
}
