//! Benchmark Suite — static catalog of canned tests used to score
//! model/provider combinations offline (feeding the registry's priority
//! field) and to re-validate a provider coming out of a long open-circuit
//! period.

use serde::{Deserialize, Serialize};

/// One canned test. Read-only catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkTest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub prompt_seed: String,
    pub expected_keywords: Vec<String>,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSuite {
    pub name: String,
    pub description: String,
    pub tests: Vec<BenchmarkTest>,
}

fn test(
    id: &str,
    name: &str,
    description: &str,
    prompt_seed: &str,
    keywords: &[&str],
    category: &str,
) -> BenchmarkTest {
    BenchmarkTest {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        prompt_seed: prompt_seed.to_string(),
        expected_keywords: keywords.iter().map(|s| s.to_string()).collect(),
        category: category.to_string(),
    }
}

/// The shipped suites. `career-analysis` is the domain suite exercising the
/// prompts our SaaS features actually send.
pub fn builtin_suites() -> Vec<BenchmarkSuite> {
    vec![
        BenchmarkSuite {
            name: "career-analysis".to_string(),
            description: "Resume, job-description, and contract analysis tasks".to_string(),
            tests: vec![
                test(
                    "career-1",
                    "resume skill extraction",
                    "Pull a structured skill list out of prose",
                    "List the technical skills in this summary: 'Senior engineer, 8 years building \
                     distributed systems in Rust and Go, led a team of five, shipped a PostgreSQL-backed \
                     billing platform.'",
                    &["rust", "go", "distributed", "postgresql"],
                    "analysis",
                ),
                test(
                    "career-2",
                    "jd requirement ranking",
                    "Identify must-have versus nice-to-have requirements",
                    "From this job post, which requirements are mandatory? 'Must have 5+ years Python. \
                     Kubernetes experience required. Familiarity with Terraform a plus.'",
                    &["python", "kubernetes", "terraform", "mandatory"],
                    "analysis",
                ),
                test(
                    "career-3",
                    "contract clause scoring",
                    "Flag the risky clause in a short contract excerpt",
                    "Which clause is unusual here? 'Employee assigns all inventions, including those \
                     conceived outside working hours and unrelated to the business.'",
                    &["assignment", "inventions", "outside", "unusual"],
                    "contract-scoring",
                ),
            ],
        },
        BenchmarkSuite {
            name: "general-reasoning".to_string(),
            description: "Multi-step reasoning over everyday constraints".to_string(),
            tests: vec![
                test(
                    "reason-1",
                    "scheduling logic",
                    "Simple constraint propagation",
                    "Alice is free Monday and Wednesday. Bob is busy Monday. Carol is only free \
                     Wednesday. When can all three meet?",
                    &["wednesday"],
                    "general",
                ),
                test(
                    "reason-2",
                    "rate comparison",
                    "Unit-rate arithmetic in words",
                    "Printer A prints 40 pages in 5 minutes, printer B prints 70 pages in 10 minutes. \
                     Which is faster and by how many pages per minute?",
                    &["a", "8", "7", "faster"],
                    "general",
                ),
                test(
                    "reason-3",
                    "negation handling",
                    "Avoid the inverted-condition trap",
                    "Every applicant without a referral is screened first. Dana has a referral. \
                     Is Dana screened first?",
                    &["no"],
                    "general",
                ),
            ],
        },
        BenchmarkSuite {
            name: "code-generation".to_string(),
            description: "Small, verifiable coding tasks".to_string(),
            tests: vec![
                test(
                    "code-1",
                    "string reversal function",
                    "Baseline codegen sanity check",
                    "Write a Python function that reverses a string without using slicing.",
                    &["def", "return", "reversed"],
                    "code",
                ),
                test(
                    "code-2",
                    "sql aggregate",
                    "Aggregate with a filter and grouping",
                    "Write a SQL query returning the number of applications per job posting created \
                     in the last 30 days.",
                    &["select", "count", "group by", "where"],
                    "code",
                ),
                test(
                    "code-3",
                    "regex extraction",
                    "Common log-parsing pattern",
                    "Give a regular expression that extracts the year, month and day from dates \
                     formatted like 2024-07-15.",
                    &["\\d{4}", "\\d{2}"],
                    "code",
                ),
            ],
        },
        BenchmarkSuite {
            name: "creative-writing".to_string(),
            description: "Tone and register control".to_string(),
            tests: vec![
                test(
                    "creative-1",
                    "cover letter opener",
                    "Professional but not stiff",
                    "Write the opening paragraph of a cover letter for a data analyst applying to a \
                     climate-tech startup.",
                    &["data", "climate"],
                    "creative",
                ),
                test(
                    "creative-2",
                    "rejection email",
                    "Kind, short, unambiguous",
                    "Draft a three-sentence email declining a job offer while keeping the door open.",
                    &["thank", "offer", "future"],
                    "creative",
                ),
            ],
        },
        BenchmarkSuite {
            name: "factual-qa".to_string(),
            description: "Short factual answers with low hedging".to_string(),
            tests: vec![
                test(
                    "fact-1",
                    "employment law basics",
                    "Common at-will employment question",
                    "In the United States, what does at-will employment mean?",
                    &["terminate", "either", "reason"],
                    "factual-qa",
                ),
                test(
                    "fact-2",
                    "http status",
                    "Plumbing knowledge the gateway itself depends on",
                    "What does HTTP status code 429 mean and what should a client do about it?",
                    &["too many requests", "rate", "retry"],
                    "factual-qa",
                ),
            ],
        },
    ]
}

/// Looks up a suite by name, case-insensitive.
pub fn find_suite(name: &str) -> Option<BenchmarkSuite> {
    builtin_suites()
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
}
