//! CLI interface for course-engine

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::artifact;
use crate::config::{self, Config};
use crate::identity::UserDirectory;
use crate::records::{Course, CourseDraft, LearningRecords, Module, ScoreInput, VideoSource};
use crate::storage::SqliteStore;
use crate::video::normalize_youtube_embed_url;

#[derive(Parser)]
#[command(name = "course-engine")]
#[command(about = "Course catalog, enrollment and progress records", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Records database (overrides the configured path)
    #[arg(long, global = true, env = "COURSE_ENGINE_DATABASE")]
    pub database: Option<PathBuf>,

    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the course catalog
    Courses {
        #[command(subcommand)]
        command: CourseCommands,
    },
    /// Enroll a user in a course
    Enroll { user: String, course: String },
    /// Remove an enrollment and its progress
    Unenroll { user: String, course: String },
    /// List the courses a user is enrolled in
    Enrolled { user: String },
    /// List the students of a course
    Students { course: String },
    /// Mark a module as completed
    Complete {
        user: String,
        course: String,
        module: String,
    },
    /// Submit an assignment file
    Submit {
        user: String,
        course: String,
        file: PathBuf,
    },
    /// Grade a submitted assignment (0-25)
    Grade {
        user: String,
        course: String,
        score: String,
    },
    /// Show progress of a user in a course
    Progress { user: String, course: String },
    /// Show pending assignments of a user
    Tasks {
        user: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Work with submitted files
    Submission {
        #[command(subcommand)]
        command: SubmissionCommands,
    },
    /// Manage the user directory
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum CourseCommands {
    /// List all courses
    List,
    /// Show one course as JSON
    Show { id: String },
    /// Create a course from a JSON file (title, description, instructor, modules)
    Add { file: PathBuf },
    /// Replace a course from a JSON file (must include the id)
    Update { file: PathBuf },
    /// Delete a course with its enrollments and progress
    Delete { id: String },
    /// Upload a video file into a module
    AttachVideo {
        course: String,
        module: String,
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum SubmissionCommands {
    /// Write the submitted file of a user to disk
    Export {
        user: String,
        course: String,
        out: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all users
    List,
    /// Register a new student
    Register { name: String, email: String },
    /// Remove a user
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}

/// Everything a command needs
struct Session {
    config: Config,
    database: PathBuf,
}

impl Session {
    fn new(config: Config, database: Option<PathBuf>) -> Result<Self> {
        let database = match database {
            Some(path) => path,
            None => config.database_path()?,
        };
        Ok(Self { config, database })
    }

    fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.database)
            .with_context(|| format!("Failed to open records database {}", self.database.display()))
    }

    fn records(&self) -> Result<LearningRecords<SqliteStore>> {
        LearningRecords::open(self.open_store()?).context("Failed to load learning records")
    }

    fn directory(&self, store: &mut SqliteStore) -> Result<UserDirectory> {
        UserDirectory::load(store, &self.config.identity.blocked_emails)
            .context("Failed to load user directory")
    }
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let session = Session::new(config, cli.database)?;

    match cli.command {
        Commands::Courses { command } => run_courses(&session, command).await?,
        Commands::Enroll { user, course } => {
            let mut records = session.records()?;
            if records.course(&course).is_none() {
                bail!("Unknown course: {}", course);
            }
            if records.enroll(&user, &course)? {
                println!("Enrolled {} in {}", user, course);
            } else {
                println!("{} is already enrolled in {}", user, course);
            }
        }
        Commands::Unenroll { user, course } => {
            let mut records = session.records()?;
            if records.unenroll(&user, &course)? {
                println!("Unenrolled {} from {}", user, course);
            } else {
                println!("{} is not enrolled in {}", user, course);
            }
        }
        Commands::Enrolled { user } => {
            let records = session.records()?;
            let courses = records.enrolled_courses(&user);
            if courses.is_empty() {
                println!("{} is not enrolled in any course.", user);
            }
            for course in courses {
                let total = records.module_count(&course.id);
                println!(
                    "{:<38} {:<40} {:>3}%  registered {}",
                    course.id,
                    course.title,
                    records.course_progress(&user, &course.id, total),
                    records.enrollment_date(&user, &course.id).format("%Y-%m-%d"),
                );
            }
        }
        Commands::Students { course } => {
            let mut store = session.open_store()?;
            let directory = session.directory(&mut store)?;
            let mut records = LearningRecords::open(store).context("Failed to load learning records")?;
            records.prune_invalid_enrollments(directory.valid_ids())?;

            let students = records.course_students(&course);
            if students.is_empty() {
                println!("No students enrolled in {}.", course);
            }
            for id in students {
                match directory.find(&id) {
                    Some(user) => println!("{:<16} {:<24} {}", user.id, user.name, user.email),
                    None => println!("{}", id),
                }
            }
        }
        Commands::Complete {
            user,
            course,
            module,
        } => {
            let mut records = session.records()?;
            let Some(found) = records.course(&course) else {
                bail!("Unknown course: {}", course);
            };
            if !found.modules.iter().any(|m| m.id == module) {
                bail!("Course {} has no module {}", course, module);
            }
            if records.mark_module_completed(&user, &course, &module)? {
                println!("Module {} completed", module);
            } else {
                println!("Module {} was already completed", module);
            }
        }
        Commands::Submit { user, course, file } => {
            let artifact = artifact::read_artifact(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut records = session.records()?;
            if !records.is_enrolled(&user, &course) {
                bail!("{} is not enrolled in {}", user, course);
            }
            let name = artifact.name.clone();
            records.submit_assignment(&user, &course, artifact)?;
            println!("Submitted {} for {}", name, course);
        }
        Commands::Grade {
            user,
            course,
            score,
        } => {
            let mut records = session.records()?;
            let input = ScoreInput::from(score);
            if records.grade_assignment(&user, &course, input)? {
                let stored = records.assignment_score(&user, &course).unwrap_or_default();
                println!("Graded {} in {}: {}/25", user, course, stored);
            } else {
                bail!("{} has not submitted an assignment for {}", user, course);
            }
        }
        Commands::Progress { user, course } => {
            let records = session.records()?;
            let Some(found) = records.course(&course) else {
                bail!("Unknown course: {}", course);
            };
            print_progress(&records, &user, found);
        }
        Commands::Tasks { user, json } => {
            let records = session.records()?;
            let tasks = records.upcoming_tasks(&user);
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No upcoming tasks.");
            } else {
                for task in tasks {
                    println!(
                        "{}  {:<14} {}",
                        task.due_date.format("%Y-%m-%d"),
                        task.assignment_title,
                        task.course_title
                    );
                }
            }
        }
        Commands::Submission { command } => match command {
            SubmissionCommands::Export { user, course, out } => {
                let records = session.records()?;
                export_submission(&records, &user, &course, &out).await?;
            }
        },
        Commands::Users { command } => {
            let mut store = session.open_store()?;
            let mut directory = session.directory(&mut store)?;
            match command {
                UserCommands::List => {
                    for user in directory.users() {
                        println!("{:<16} {:<10} {:<24} {}", user.id, user.role.to_string(), user.name, user.email);
                    }
                    println!("\n{} students", directory.student_count());
                }
                UserCommands::Register { name, email } => {
                    let user = directory.register_student(&mut store, &name, &email)?;
                    println!("Registered {} ({})", user.name, user.id);
                }
                UserCommands::Remove { id } => {
                    if !directory.remove_user(&mut store, &id)? {
                        bail!("Unknown user: {}", id);
                    }
                    let mut records =
                        LearningRecords::open(store).context("Failed to load learning records")?;
                    records.prune_invalid_enrollments(directory.valid_ids())?;
                    println!("Removed {}", id);
                }
            }
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                print!("{}", toml::to_string_pretty(&session.config)?);
                println!("# database in use: {}", session.database.display());
            }
            ConfigCommands::Path => {
                println!("{}", config::config_path()?.display());
            }
        },
    }

    Ok(())
}

async fn run_courses(session: &Session, command: CourseCommands) -> Result<()> {
    match command {
        CourseCommands::List => {
            let records = session.records()?;
            for course in records.courses() {
                println!(
                    "{:<38} {:<40} {:<16} {} modules",
                    course.id,
                    course.title,
                    course.instructor,
                    course.modules.len()
                );
            }
        }
        CourseCommands::Show { id } => {
            let records = session.records()?;
            let course = records
                .course(&id)
                .with_context(|| format!("Unknown course: {}", id))?;
            println!("{}", serde_json::to_string_pretty(course)?);
        }
        CourseCommands::Add { file } => {
            let mut draft: CourseDraft = read_json_file(&file).await?;
            if draft.title.trim().is_empty() {
                bail!("Course title is required");
            }
            normalize_modules(&mut draft.modules);
            let mut records = session.records()?;
            let course = records.add_course(draft)?;
            println!("Created course {}", course.id);
        }
        CourseCommands::Update { file } => {
            let mut course: Course = read_json_file(&file).await?;
            normalize_modules(&mut course.modules);
            let id = course.id.clone();
            let mut records = session.records()?;
            if !records.update_course(course)? {
                bail!("Unknown course: {}", id);
            }
            println!("Updated course {}", id);
        }
        CourseCommands::Delete { id } => {
            let mut records = session.records()?;
            if records.delete_course(&id)? {
                println!("Deleted course {}", id);
            } else {
                println!("Course {} not found; dangling references cleaned", id);
            }
        }
        CourseCommands::AttachVideo {
            course,
            module,
            file,
        } => {
            let video = artifact::read_video_upload(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut records = session.records()?;
            let mut updated = records
                .course(&course)
                .cloned()
                .with_context(|| format!("Unknown course: {}", course))?;
            let target = updated
                .modules
                .iter_mut()
                .find(|m| m.id == module)
                .with_context(|| format!("Course {} has no module {}", course, module))?;
            target.video_source = Some(VideoSource::Upload);
            target.video_url = video.data_url;
            records.update_course(updated)?;
            println!("Attached {} ({} bytes) to {}", video.name, video.size, module);
        }
    }
    Ok(())
}

fn normalize_modules(modules: &mut [Module]) {
    for module in modules {
        if module.effective_video_source() == VideoSource::Youtube {
            module.video_url = normalize_youtube_embed_url(&module.video_url);
        }
    }
}

async fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid course JSON in {}", path.display()))
}

fn print_progress(records: &LearningRecords<SqliteStore>, user: &str, course: &Course) {
    let total = course.modules.len();
    let details = records.assignment_details(user, &course.id);

    println!("{} ({})", course.title, course.id);
    println!(
        "  Modules:    {}/{}",
        records.completed_modules(user, &course.id).len(),
        total
    );
    if details.assignment_submitted {
        let name = if details.assignment_file_name.is_empty() {
            "(no file)"
        } else {
            details.assignment_file_name.as_str()
        };
        println!("  Assignment: submitted {}", name);
    } else {
        println!("  Assignment: not submitted");
    }
    match details.assignment_score {
        Some(score) => println!("  Score:      {}/25", score),
        None => println!("  Score:      not graded"),
    }
    println!("  Progress:   {}%", records.course_progress(user, &course.id, total));
    let status = if records.is_course_passed(user, &course.id, total) {
        "passed"
    } else if records.has_completed_course_components(user, &course.id, total) {
        "completed, below pass mark"
    } else {
        "in progress"
    };
    println!("  Status:     {}", status);
}

async fn export_submission(
    records: &LearningRecords<SqliteStore>,
    user: &str,
    course: &str,
    out: &Path,
) -> Result<()> {
    let details = records.assignment_details(user, course);
    if !details.assignment_submitted || details.assignment_file_data_url.is_empty() {
        bail!("No submitted file for {} in {}", user, course);
    }

    let (media_type, bytes) =
        artifact::decode_data_url(&details.assignment_file_data_url, &details.assignment_file_type)?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!(
        "Wrote {} ({}, {} bytes) to {}",
        details.assignment_file_name,
        media_type,
        bytes.len(),
        out.display()
    );
    Ok(())
}
