use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::InputConfig;

/// Instruction sent as the system message with every test prompt.
///
/// The model under test plays a router: it must answer with the name of the
/// hosted model best suited to the user's prompt, and nothing else.
pub const SYSTEM_PROMPT: &str = "You are a System Prompt Analyzer. Your task is to receive a user's prompt and determine which AI model from the following is **best suited** to respond:

- gpt-5o
- claude-sonnet-4
- gemini-2.5-pro
- deepseek-v3.1
- xai.grok-4
- sonar-pro

You must **output only the model name** — nothing else.

### Step 1: Analyze the user prompt
- Identify the main task: e.g., reasoning, coding, writing, creative content, multimodal (text, image, video), planning, educational guidance, research, tool usage, or real-time information retrieval.
- Identify whether the task requires:
  - deep logical reasoning or multi-step problem solving
  - structured output or planning
  - creative writing or content generation
  - handling large context or documents
  - multimodal understanding (images, videos, audio)
  - real-time web information and citations

### Step 2: Match task needs to model strengths
- **gpt-5o**: Best for deep reasoning, coding, complex problem-solving, high accuracy, multimodal tasks, long context handling, and advanced logical workflows. Ideal when accuracy, reasoning depth, or coding complexity matters.
- **claude-sonnet-4**: Excels at long-context tasks, structured document analysis, code generation, data analysis, and creative writing. Best for tasks that require understanding or generating large, structured content.
- **gemini-2.5-pro**: Strong for general-purpose multimodal tasks, including text, images, video, or audio. Excels at large-context reasoning and integrated multimedia outputs.
- **deepseek-v3.1**: Specialized in structured reasoning, step-by-step task execution, planning, education guidance, and actionable workflows. Ideal for multi-step structured plans or problem solving.
- **xai.grok-4**: Best at zero-shot reasoning, tool integration, advanced workflows, and tasks requiring general intelligence-like planning or strategy.
- **sonar-pro**: Optimized for real-time research, web-grounded responses, citations, and retrieving up-to-date information. Best when the user needs current data, references, or verified facts.

### Step 3: Selection Rules
1. Choose the model that is **most specialized for the core requirement**.
2. If multiple models could work, pick the one with strengths **closest to the task**.
3. If the prompt is ambiguous, generate **one clarifying question** to resolve it before selecting a model.
4. **Always output only the model name** in lowercase (matching the list above) without any other text or formatting or spaces.";

/// A prompt to benchmark.
///
/// Prompt files are JSONL, one `{"prompt": "...", "model": "..."}` object per
/// line, where `model` is the reference label the prompt was written for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPrompt {
    /// The user message
    pub prompt: String,
    /// Reference label, used only for reporting
    pub model: String,
}

/// Compile-time form of [`TestPrompt`] used by the built-in corpus.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinPrompt {
    pub prompt: &'static str,
    pub model: &'static str,
}

impl From<&BuiltinPrompt> for TestPrompt {
    fn from(p: &BuiltinPrompt) -> Self {
        Self {
            prompt: p.prompt.to_string(),
            model: p.model.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub name: &'static str,
    pub prompts: &'static [BuiltinPrompt],
}

/// Every built-in prompt, in corpus order.
pub fn all() -> Vec<TestPrompt> {
    CATEGORIES
        .iter()
        .flat_map(|c| c.prompts.iter())
        .map(TestPrompt::from)
        .collect()
}

/// Built-in prompts of one category. Unknown names give an empty list.
pub fn by_category(name: &str) -> Vec<TestPrompt> {
    CATEGORIES
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.prompts.iter().map(TestPrompt::from).collect())
        .unwrap_or_default()
}

/// Built-in prompts written for `label`, in corpus order.
pub fn by_reference(label: &str) -> Vec<TestPrompt> {
    CATEGORIES
        .iter()
        .flat_map(|c| c.prompts.iter())
        .filter(|p| p.model == label)
        .map(TestPrompt::from)
        .collect()
}

pub fn random() -> TestPrompt {
    let prompts: Vec<&BuiltinPrompt> = CATEGORIES.iter().flat_map(|c| c.prompts.iter()).collect();
    let index = thread_rng().gen_range(0..prompts.len());
    TestPrompt::from(prompts[index])
}

pub fn is_category(name: &str) -> bool {
    CATEGORIES.iter().any(|c| c.name == name)
}

/// Reference labels used by the built-in corpus, in first-seen order.
pub fn reference_labels() -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = Vec::new();
    for prompt in CATEGORIES.iter().flat_map(|c| c.prompts.iter()) {
        if !labels.contains(&prompt.model) {
            labels.push(prompt.model);
        }
    }
    labels
}

pub async fn load_prompts(path: &Path) -> Result<Vec<TestPrompt>> {
    let file = File::open(path)
        .await
        .with_context(|| format!("failed to open prompt file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut prompts = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<TestPrompt>(&line) {
            Ok(prompt) => prompts.push(prompt),
            Err(e) => warn!("Failed to parse prompt line: {}", e),
        }
    }

    Ok(prompts)
}

/// Resolve the prompts for a run: pick the source, filter, sample, shuffle.
pub async fn select(input: &InputConfig) -> Result<Vec<TestPrompt>> {
    let prompts = match (&input.file, &input.category) {
        (Some(file), _) => load_prompts(file).await?,
        (None, Some(category)) => by_category(category),
        (None, None) => all(),
    };

    let prompts: Vec<TestPrompt> = match &input.reference {
        Some(label) => prompts.into_iter().filter(|p| &p.model == label).collect(),
        None => prompts,
    };

    let mut prompts: Vec<TestPrompt> = if let Some(sample_size) = input.sample_size {
        prompts.into_iter().take(sample_size).collect()
    } else {
        prompts
    };

    if input.shuffle {
        let mut rng = thread_rng();
        prompts.shuffle(&mut rng);
        info!("Shuffled {} prompts", prompts.len());
    }

    debug!("Selected {} prompts", prompts.len());

    Ok(prompts)
}

const DEEP_REASONING_COMPLEX_PROBLEM_SOLVING: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "Solve this complex mathematical problem step by step: Given a 3D matrix A with eigenvalues λ1, λ2, λ3, prove that det(A) = λ1 × λ2 × λ3 using matrix diagonalization and properties of determinants.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Analyze the ethical implications of autonomous vehicles making split-second decisions in accident scenarios. Consider multiple stakeholders, legal frameworks, and moral philosophy principles.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Design a distributed system architecture for a global e-commerce platform that can handle 1 million concurrent users with 99.99% uptime. Include fault tolerance, scalability, and security considerations.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Create a comprehensive algorithm for natural language understanding that can parse ambiguous sentences, resolve references, and extract semantic meaning across multiple languages.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Develop a machine learning model that can predict stock market trends by analyzing multiple data sources including news sentiment, technical indicators, and macroeconomic factors.",
        model: "gpt-5o",
    },
];

const LONG_CONTEXT_DOCUMENT_ANALYSIS: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "Analyze this 50-page research paper on climate change and provide a comprehensive summary with key findings, methodology critique, and implications for policy makers.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Review this 1000-line codebase and identify architectural patterns, potential bugs, performance bottlenecks, and suggest refactoring improvements.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Examine this legal contract and highlight potential issues, ambiguous clauses, missing protections, and areas that need clarification or modification.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Process this large dataset of customer feedback and create detailed insights about product satisfaction, common complaints, and actionable recommendations for improvement.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Analyze this historical document collection and identify patterns, connections, and insights that could inform current decision-making processes.",
        model: "claude-sonnet-4",
    },
];

const MULTIMODAL_TASKS: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "Describe the content of this image in detail, then create a story based on what you see, incorporating visual elements and emotional context.",
        model: "gemini-2.5-pro",
    },
    BuiltinPrompt {
        prompt: "Analyze this video clip and provide a detailed transcript, identify key moments, and suggest how it could be edited for different audiences.",
        model: "gemini-2.5-pro",
    },
    BuiltinPrompt {
        prompt: "Listen to this audio recording and transcribe it, then analyze the speaker's tone, emotion, and provide insights about the content.",
        model: "gemini-2.5-pro",
    },
    BuiltinPrompt {
        prompt: "Create a multimedia presentation combining text, images, and video that explains quantum computing concepts to high school students.",
        model: "gemini-2.5-pro",
    },
    BuiltinPrompt {
        prompt: "Design an interactive infographic that combines charts, images, and text to explain the impact of renewable energy on global economies.",
        model: "gemini-2.5-pro",
    },
];

const STRUCTURED_REASONING_PLANNING: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "Create a detailed project plan for launching a new mobile app, including timeline, resource allocation, risk assessment, and milestone tracking.",
        model: "deepseek-v3.1",
    },
    BuiltinPrompt {
        prompt: "Develop a step-by-step troubleshooting guide for diagnosing and fixing common computer hardware issues, organized by symptom and solution.",
        model: "deepseek-v3.1",
    },
    BuiltinPrompt {
        prompt: "Design a curriculum for teaching artificial intelligence to middle school students, with clear learning objectives, activities, and assessment methods.",
        model: "deepseek-v3.1",
    },
    BuiltinPrompt {
        prompt: "Create a comprehensive business strategy for entering a new market, including market analysis, competitive positioning, and implementation roadmap.",
        model: "deepseek-v3.1",
    },
    BuiltinPrompt {
        prompt: "Develop a systematic approach to organizing a large personal library, including categorization methods, digital cataloging, and maintenance schedules.",
        model: "deepseek-v3.1",
    },
];

const TOOL_INTEGRATION_WORKFLOWS: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "Design an automated workflow that integrates multiple APIs to collect data from social media, analyze sentiment, and generate marketing insights.",
        model: "xai.grok-4",
    },
    BuiltinPrompt {
        prompt: "Create a system that can automatically generate code documentation, run tests, and deploy applications based on git commits and pull requests.",
        model: "xai.grok-4",
    },
    BuiltinPrompt {
        prompt: "Develop an intelligent assistant that can coordinate between calendar apps, email clients, and project management tools to optimize productivity.",
        model: "xai.grok-4",
    },
    BuiltinPrompt {
        prompt: "Design a workflow automation system that can process invoices, validate data, and integrate with accounting software for seamless financial management.",
        model: "xai.grok-4",
    },
    BuiltinPrompt {
        prompt: "Create an AI-powered workflow that can analyze customer support tickets, categorize them, and route them to appropriate team members automatically.",
        model: "xai.grok-4",
    },
];

const REAL_TIME_RESEARCH_CURRENT_INFORMATION: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "What are the latest developments in quantum computing research as of this month? Please provide recent citations and current breakthroughs.",
        model: "sonar-pro",
    },
    BuiltinPrompt {
        prompt: "Find the most recent statistics on global renewable energy adoption and provide sources for the data.",
        model: "sonar-pro",
    },
    BuiltinPrompt {
        prompt: "What are the current trends in artificial intelligence regulation across different countries? Include recent policy changes and their implications.",
        model: "sonar-pro",
    },
    BuiltinPrompt {
        prompt: "Research the latest developments in COVID-19 variants and provide current recommendations from health authorities with proper citations.",
        model: "sonar-pro",
    },
    BuiltinPrompt {
        prompt: "What are the most recent findings on climate change impacts and mitigation strategies? Include current scientific consensus and recent studies.",
        model: "sonar-pro",
    },
];

const CREATIVE_WRITING_CONTENT_GENERATION: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "Write a compelling short story about a time traveler who discovers they can only travel to moments of their own life, exploring themes of regret and redemption.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Create a persuasive marketing campaign for an eco-friendly product, including taglines, social media content, and customer testimonials.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Write a comprehensive guide to sustainable living that inspires readers to make environmental changes in their daily lives.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Create a series of blog posts about the future of work, exploring remote work trends, automation impacts, and career development strategies.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Write a children's book about diversity and inclusion that teaches valuable lessons while being entertaining and age-appropriate.",
        model: "claude-sonnet-4",
    },
];

const CODING_SOFTWARE_DEVELOPMENT: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "Write a Python function that implements a binary search tree with insertion, deletion, and traversal methods, including proper error handling.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Create a React component for a dynamic data table with sorting, filtering, and pagination capabilities, including TypeScript interfaces.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Develop a REST API using Node.js and Express that handles user authentication, CRUD operations, and includes comprehensive error handling.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Write a Docker configuration for a microservices architecture with proper networking, volume management, and environment variable handling.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Create a machine learning pipeline in Python that preprocesses data, trains multiple models, and evaluates their performance using cross-validation.",
        model: "gpt-5o",
    },
];

const DATA_ANALYSIS_VISUALIZATION: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "Analyze this dataset of e-commerce transactions and create visualizations that show seasonal trends, customer behavior patterns, and product performance metrics.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Process this survey data and generate insights about customer satisfaction, including statistical analysis and recommendations for improvement.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Create a comprehensive report analyzing social media engagement data, identifying peak posting times, content performance, and audience demographics.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Analyze this financial dataset and create visualizations showing investment performance, risk analysis, and portfolio optimization opportunities.",
        model: "claude-sonnet-4",
    },
    BuiltinPrompt {
        prompt: "Process this healthcare dataset and identify patterns in patient outcomes, treatment effectiveness, and areas for quality improvement.",
        model: "claude-sonnet-4",
    },
];

const EDUCATIONAL_CONTENT_LEARNING: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "Create a lesson plan for teaching photosynthesis to 5th graders, including hands-on activities, assessment methods, and differentiation strategies.",
        model: "deepseek-v3.1",
    },
    BuiltinPrompt {
        prompt: "Develop a tutorial series for learning JavaScript from beginner to advanced, with practical exercises and real-world project examples.",
        model: "deepseek-v3.1",
    },
    BuiltinPrompt {
        prompt: "Design a workshop on public speaking skills, including warm-up exercises, practice scenarios, and feedback mechanisms.",
        model: "deepseek-v3.1",
    },
    BuiltinPrompt {
        prompt: "Create a study guide for learning a new language, including vocabulary building strategies, grammar explanations, and cultural context.",
        model: "deepseek-v3.1",
    },
    BuiltinPrompt {
        prompt: "Develop a training program for new employees, covering company policies, job responsibilities, and professional development opportunities.",
        model: "deepseek-v3.1",
    },
];

const PROBLEM_SOLVING_CRITICAL_THINKING: &[BuiltinPrompt] = &[
    BuiltinPrompt {
        prompt: "A company needs to reduce operational costs by 20% while maintaining quality. Analyze the current processes and propose a comprehensive cost-cutting strategy.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Design a system to detect and prevent fraud in online transactions, considering various attack vectors and implementing multiple security layers.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Create a disaster recovery plan for a data center, including backup strategies, communication protocols, and business continuity measures.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Develop a strategy for managing team conflicts in a remote work environment, considering cultural differences and communication challenges.",
        model: "gpt-5o",
    },
    BuiltinPrompt {
        prompt: "Design an algorithm to optimize delivery routes for a logistics company, considering traffic patterns, delivery windows, and vehicle capacity.",
        model: "gpt-5o",
    },
];

pub const CATEGORIES: &[Category] = &[
    Category {
        name: "Deep Reasoning & Complex Problem Solving",
        prompts: DEEP_REASONING_COMPLEX_PROBLEM_SOLVING,
    },
    Category {
        name: "Long Context & Document Analysis",
        prompts: LONG_CONTEXT_DOCUMENT_ANALYSIS,
    },
    Category {
        name: "Multimodal Tasks",
        prompts: MULTIMODAL_TASKS,
    },
    Category {
        name: "Structured Reasoning & Planning",
        prompts: STRUCTURED_REASONING_PLANNING,
    },
    Category {
        name: "Tool Integration & Workflows",
        prompts: TOOL_INTEGRATION_WORKFLOWS,
    },
    Category {
        name: "Real-time Research & Current Information",
        prompts: REAL_TIME_RESEARCH_CURRENT_INFORMATION,
    },
    Category {
        name: "Creative Writing & Content Generation",
        prompts: CREATIVE_WRITING_CONTENT_GENERATION,
    },
    Category {
        name: "Coding & Software Development",
        prompts: CODING_SOFTWARE_DEVELOPMENT,
    },
    Category {
        name: "Data Analysis & Visualization",
        prompts: DATA_ANALYSIS_VISUALIZATION,
    },
    Category {
        name: "Educational Content & Learning",
        prompts: EDUCATIONAL_CONTENT_LEARNING,
    },
    Category {
        name: "Problem Solving & Critical Thinking",
        prompts: PROBLEM_SOLVING_CRITICAL_THINKING,
    },
];
