//! Prompt templates for the "Flow" assistant.

use flowboard_core::types::{Project, Task, DONE_STATUS};

const NO_TASKS_IN_COLUMN: &str = "_No tasks in this column._";

/// Completed tasks, total (at least 1) and rounded percentage.
pub fn progress(tasks: &[Task]) -> (usize, usize, usize) {
    let completed = tasks.iter().filter(|t| t.status == DONE_STATUS).count();
    let total = tasks.len().max(1);
    let percent = ((completed as f64 / total as f64) * 100.0).round() as usize;
    (completed, total, percent)
}

fn bullet_list<'a>(tasks: impl Iterator<Item = &'a Task>, describe_missing: bool) -> String {
    tasks
        .map(|t| {
            if !t.description.is_empty() {
                format!("• {} — {}", t.title, t.description)
            } else if describe_missing {
                format!("• {} (No description)", t.title)
            } else {
                format!("• {}", t.title)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_placeholder(text: String, placeholder: &str) -> String {
    if text.is_empty() {
        placeholder.to_string()
    } else {
        text
    }
}

/// Whole-project health check, tasks grouped by column in board order.
pub fn project_summary(project: &Project, tasks: &[Task]) -> String {
    let (completed, total, percent) = progress(tasks);

    let distribution = project
        .column_order
        .iter()
        .map(|column| {
            let list = bullet_list(tasks.iter().filter(|t| &t.status == column), true);
            format!("**{}**:\n{}\n", column, or_placeholder(list, NO_TASKS_IN_COLUMN))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let description = if project.description.is_empty() {
        "Not provided. A good description helps align the team."
    } else {
        project.description.as_str()
    };

    format!(
        r#"
You are "Flow", an expert project management AI assistant. Your tone is professional, insightful, and encouraging.

**Perform a "Project Health Check" on the following data and generate a summary.**

### Project Details
- **Name:** {name}
- **Description:** {description}
- **Creation Date:** {created}
- **Overall Progress:** {percent}% complete ({completed} of {total} tasks are 'Done').

### Task Distribution by Status
{distribution}

---
**Your Mandate:**

1.  **Project Overview (2-3 sentences):**
    * Start with a clear, concise summary of the project's current state.
    * Mention the progress percentage and what it implies (e.g., "just beginning," "well underway," "nearing completion").
    * Comment on the task distribution. Is there a bottleneck in 'In Progress'? Are there a lot of tasks still in 'To Do'?

2.  **Observations & Potential Risks (1-2 sentences, if any):**
    * Politely identify potential issues such as tasks without descriptions, non-standard column names, or an overloaded 'In Progress' column.
    * If there are no risks, you can skip this section or give a positive observation.

3.  **Actionable Next Steps (2-3 bullet points):**
    * Based on your analysis, suggest clear, specific actions.
    * Focus on what will move the project forward most effectively.

**Final Output Style:**
* Use Markdown for formatting (headings, bolding, bullet points).
* Be concise, professional, and directly helpful. Do not sound like a generic chatbot.
"#,
        name = project.name,
        description = description,
        created = project.created_at.format("%Y-%m-%d"),
        percent = percent,
        completed = completed,
        total = total,
        distribution = distribution,
    )
}

/// Project snapshot followed by a focused look at one column.
pub fn column_summary(project: &Project, column: &str, tasks: &[Task]) -> String {
    let (completed, total, percent) = progress(tasks);
    let list = bullet_list(tasks.iter().filter(|t| t.status == column), false);

    format!(
        r#"
You are "Flow", an expert project management AI assistant. Your tone is professional, insightful, and encouraging.
Generate a two-part analysis based on the data below.

### Overall Project Context
- **Project Name:** {name}
- **Overall Progress:** {percent}% complete ({completed} of {total} tasks are 'Done').

### Column-Specific Context
- **Column to Analyze:** "{column}"
- **Tasks in this Column:**
{list}

---
**Your Mandate:**

1.  **Overall Project Snapshot (1 sentence):**
    * Start with a single, concise sentence summarizing the entire project's health and progress percentage.

2.  **Detailed Column Analysis (2-3 sentences + bullet points):**
    * Immediately after the first sentence, create a new paragraph focusing ONLY on the **"{column}"** column.
    * Identify key themes or patterns among the tasks in this column.
    * Point out any high-priority items or potential blockers you observe.
    * Suggest 1-2 clear, actionable next steps specifically for the tasks *in this column*.

**Final Output Style:** Use Markdown for formatting. Be concise and directly helpful.
"#,
        name = project.name,
        percent = percent,
        completed = completed,
        total = total,
        column = column,
        list = or_placeholder(list, NO_TASKS_IN_COLUMN),
    )
}

/// Question answered from the project's own data.
pub fn ask(project: &Project, tasks: &[Task], question: &str) -> String {
    let task_list = tasks
        .iter()
        .map(|t| {
            let description = if t.description.is_empty() {
                "None"
            } else {
                t.description.as_str()
            };
            format!(
                "• Task: \"{}\" [Status: {}] - Description: {}",
                t.title, t.status, description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let description = if project.description.is_empty() {
        "No description provided."
    } else {
        project.description.as_str()
    };

    format!(
        r#"
You are "Flow", an expert project management AI partner. Your persona is proactive, intelligent, and helpful.
You are a strategic assistant designed to help users move their projects forward effectively.

### Project Context
- **Name:** {name}
- **Description:** {description}
- **Creation Date:** {created}

### Full Task List
{task_list}
---
**User's Question:** "{question}"
---
**Your Core Instructions:**
1.  **Analyze Intent:** First, understand the user's goal. Are they asking for information, brainstorming ideas, or looking for next steps?
2.  **Handle Two Scenarios:**
    * **If the project has NO tasks:** Help the user get started. If they ask for next steps or task ideas, brainstorm 3-5 initial tasks based on the project's **name and description**.
    * **If the project HAS tasks:** Base your answer on the provided task list. If asked to list tasks, group them by their status.
3.  **Be a True Assistant:** Do not simply state "I don't have that information." Leverage your expertise as a project manager.
4.  **Formatting:** Use Markdown (especially bullet points) to make your responses clear and organized.
"#,
        name = project.name,
        description = description,
        created = project.created_at.format("%Y-%m-%d"),
        task_list = or_placeholder(task_list, "This project has no tasks yet."),
        question = question,
    )
}
