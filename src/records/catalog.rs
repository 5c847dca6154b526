//! Catalog - the set of courses and the modules each course owns

use serde::{Deserialize, Serialize};

/// Where a module's video comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    Youtube,
    Upload,
}

impl VideoSource {
    /// Guess the source of a module stored without an explicit one
    pub fn infer(video_url: &str) -> Self {
        if video_url.starts_with("data:video") {
            VideoSource::Upload
        } else {
            VideoSource::Youtube
        }
    }
}

impl std::fmt::Display for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoSource::Youtube => write!(f, "youtube"),
            VideoSource::Upload => write!(f, "upload"),
        }
    }
}

/// A unit of course content. Its id is only unique within its course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_source: Option<VideoSource>,
    #[serde(default)]
    pub video_url: String,
}

impl Module {
    /// The stored source, or the one implied by the video URL
    pub fn effective_video_source(&self) -> VideoSource {
        self.video_source
            .unwrap_or_else(|| VideoSource::infer(&self.video_url))
    }
}

/// A course and its ordered modules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructor: String,
    #[serde(default)]
    pub modules: Vec<Module>,
}

/// Input for creating a course; the id is assigned by the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructor: String,
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl CourseDraft {
    fn into_course(self, id: String) -> Course {
        Course {
            id,
            title: self.title,
            description: self.description,
            instructor: self.instructor,
            modules: self.modules,
        }
    }
}

/// Generate a fresh course id
pub fn next_course_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ordered collection of courses, stored as a JSON array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    courses: Vec<Course>,
}

impl Catalog {
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn get(&self, course_id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.get(course_id).is_some()
    }

    /// Number of modules in a course, 0 when the course is unknown
    pub fn module_count(&self, course_id: &str) -> usize {
        self.get(course_id).map(|c| c.modules.len()).unwrap_or(0)
    }

    /// Append a new course under a freshly generated id
    pub fn insert(&mut self, draft: CourseDraft) -> &Course {
        let mut id = next_course_id();
        while self.contains(&id) {
            id = next_course_id();
        }
        let index = self.courses.len();
        self.courses.push(draft.into_course(id));
        &self.courses[index]
    }

    /// Replace the course with the same id. Returns false if there is none.
    pub fn replace(&mut self, course: Course) -> bool {
        match self.courses.iter_mut().find(|c| c.id == course.id) {
            Some(slot) => {
                *slot = course;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, course_id: &str) -> bool {
        let before = self.courses.len();
        self.courses.retain(|c| c.id != course_id);
        self.courses.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str, url: &str) -> Module {
        Module {
            id: id.to_string(),
            title: format!("Module {}", id),
            content: String::new(),
            video_source: None,
            video_url: url.to_string(),
        }
    }

    fn draft(title: &str) -> CourseDraft {
        CourseDraft {
            title: title.to_string(),
            description: "desc".to_string(),
            instructor: "Jane Doe".to_string(),
            modules: vec![],
        }
    }

    #[test]
    fn test_video_source_inference() {
        assert_eq!(
            module("m1", "data:video/mp4;base64,AAAA").effective_video_source(),
            VideoSource::Upload
        );
        assert_eq!(
            module("m1", "https://www.youtube.com/embed/abc").effective_video_source(),
            VideoSource::Youtube
        );

        let mut explicit = module("m1", "data:video/mp4;base64,AAAA");
        explicit.video_source = Some(VideoSource::Youtube);
        assert_eq!(explicit.effective_video_source(), VideoSource::Youtube);
    }

    #[test]
    fn test_insert_assigns_unique_ids_and_keeps_order() {
        let mut catalog = Catalog::default();
        let first = catalog.insert(draft("First")).id.clone();
        let second = catalog.insert(draft("Second")).id.clone();

        assert_ne!(first, second);
        let titles: Vec<_> = catalog.courses().iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert_eq!(catalog.module_count(&first), 0);
    }

    #[test]
    fn test_replace_unknown_id_is_noop() {
        let mut catalog = Catalog::default();
        let id = catalog.insert(draft("Original")).id.clone();

        let stranger = Course {
            id: "nope".to_string(),
            title: "Stranger".to_string(),
            description: String::new(),
            instructor: String::new(),
            modules: vec![],
        };
        assert!(!catalog.replace(stranger));
        assert_eq!(catalog.courses().len(), 1);

        let mut edited = catalog.get(&id).unwrap().clone();
        edited.title = "Edited".to_string();
        edited.modules.push(module("m1", ""));
        assert!(catalog.replace(edited));
        assert_eq!(catalog.get(&id).unwrap().title, "Edited");
        assert_eq!(catalog.module_count(&id), 1);
    }

    #[test]
    fn test_course_json_uses_camel_case() {
        let json = r#"[{"id":"c1","title":"T","description":"D","instructor":"I",
            "modules":[{"id":"m1","title":"M","content":"C","videoUrl":"https://youtu.be/x"}]}]"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        let course = catalog.get("c1").unwrap();
        assert_eq!(course.modules[0].video_url, "https://youtu.be/x");
        assert!(course.modules[0].video_source.is_none());

        let out = serde_json::to_string(&catalog).unwrap();
        assert!(out.starts_with('['));
        assert!(out.contains("\"videoUrl\""));
        assert!(!out.contains("videoSource"));
    }
}
