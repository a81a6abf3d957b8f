//! Experience, education, skill and project repository.
//!
//! # Responsibility
//! - Provide create/list/delete for the four per-user entry collections.
//! - Serve the persisted skill names used to seed skill deduplication.
//!
//! # Invariants
//! - Every query is scoped by `user_id`.
//! - Lists are deterministic: newest start date first for dated entries,
//!   insertion order for skills and projects.

use crate::model::profile::{EntityId, Education, Experience, Project, Skill};
use crate::repo::{
    bool_to_int, decode_list, encode_list, int_to_bool, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row};

/// Row counts per collection for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryCounts {
    pub experiences: usize,
    pub educations: usize,
    pub skills: usize,
    pub projects: usize,
}

impl EntryCounts {
    pub fn total(&self) -> usize {
        self.experiences + self.educations + self.skills + self.projects
    }
}

pub trait EntryRepository {
    fn create_experience(&self, experience: &Experience) -> RepoResult<EntityId>;
    fn list_experiences(&self, user_id: &str) -> RepoResult<Vec<Experience>>;
    fn create_education(&self, education: &Education) -> RepoResult<EntityId>;
    fn list_educations(&self, user_id: &str) -> RepoResult<Vec<Education>>;
    fn create_skill(&self, skill: &Skill) -> RepoResult<EntityId>;
    fn get_skill(&self, user_id: &str, id: EntityId) -> RepoResult<Option<Skill>>;
    fn list_skills(&self, user_id: &str) -> RepoResult<Vec<Skill>>;
    /// Names of every persisted skill for `user_id`, as stored.
    fn list_skill_names(&self, user_id: &str) -> RepoResult<Vec<String>>;
    fn delete_skill(&self, user_id: &str, id: EntityId) -> RepoResult<()>;
    fn create_project(&self, project: &Project) -> RepoResult<EntityId>;
    fn list_projects(&self, user_id: &str) -> RepoResult<Vec<Project>>;
    fn count_entries(&self, user_id: &str) -> RepoResult<EntryCounts>;
}

pub struct SqliteEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn count(&self, table: &'static str, user_id: &str) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE user_id = ?1;"),
            [user_id],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count in {table}")))
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn create_experience(&self, experience: &Experience) -> RepoResult<EntityId> {
        experience.validate()?;
        self.conn.execute(
            "INSERT INTO experiences (
                id, user_id, company, title, location, start_date, end_date,
                current, description, highlights, keywords
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                experience.id.to_string(),
                experience.user_id.as_str(),
                experience.company.as_str(),
                experience.title.as_str(),
                experience.location.as_deref(),
                experience.start_date,
                experience.end_date,
                bool_to_int(experience.current),
                experience.description.as_str(),
                encode_list(&experience.highlights)?,
                encode_list(&experience.keywords)?,
            ],
        )?;
        Ok(experience.id)
    }

    fn list_experiences(&self, user_id: &str) -> RepoResult<Vec<Experience>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, company, title, location, start_date, end_date,
                    current, description, highlights, keywords
             FROM experiences
             WHERE user_id = ?1
             ORDER BY start_date DESC, id ASC;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_experience_row(row)?);
        }
        Ok(items)
    }

    fn create_education(&self, education: &Education) -> RepoResult<EntityId> {
        education.validate()?;
        self.conn.execute(
            "INSERT INTO educations (
                id, user_id, institution, degree, field, start_date, end_date, gpa, honors
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                education.id.to_string(),
                education.user_id.as_str(),
                education.institution.as_str(),
                education.degree.as_str(),
                education.field.as_str(),
                education.start_date,
                education.end_date,
                education.gpa,
                encode_list(&education.honors)?,
            ],
        )?;
        Ok(education.id)
    }

    fn list_educations(&self, user_id: &str) -> RepoResult<Vec<Education>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, institution, degree, field, start_date, end_date, gpa, honors
             FROM educations
             WHERE user_id = ?1
             ORDER BY start_date DESC, id ASC;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            let honors: String = row.get("honors")?;
            items.push(Education {
                id: parse_uuid(&id_text, "educations.id")?,
                user_id: row.get("user_id")?,
                institution: row.get("institution")?,
                degree: row.get("degree")?,
                field: row.get("field")?,
                start_date: row.get("start_date")?,
                end_date: row.get("end_date")?,
                gpa: row.get("gpa")?,
                honors: decode_list(&honors, "educations.honors")?,
            });
        }
        Ok(items)
    }

    fn create_skill(&self, skill: &Skill) -> RepoResult<EntityId> {
        skill.validate()?;
        self.conn.execute(
            "INSERT INTO skills (id, user_id, name, category, proficiency, years_exp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                skill.id.to_string(),
                skill.user_id.as_str(),
                skill.name.as_str(),
                skill.category.as_str(),
                skill.proficiency.as_deref(),
                skill.years_exp,
            ],
        )?;
        Ok(skill.id)
    }

    fn get_skill(&self, user_id: &str, id: EntityId) -> RepoResult<Option<Skill>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, category, proficiency, years_exp
             FROM skills
             WHERE user_id = ?1 AND id = ?2;",
        )?;
        let mut rows = stmt.query(params![user_id, id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_skill_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_skills(&self, user_id: &str) -> RepoResult<Vec<Skill>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, category, proficiency, years_exp
             FROM skills
             WHERE user_id = ?1
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_skill_row(row)?);
        }
        Ok(items)
    }

    fn list_skill_names(&self, user_id: &str) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM skills WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC;")?;
        let names = stmt
            .query_map([user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn delete_skill(&self, user_id: &str, id: EntityId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM skills WHERE user_id = ?1 AND id = ?2;",
            params![user_id, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "Skill",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn create_project(&self, project: &Project) -> RepoResult<EntityId> {
        project.validate()?;
        self.conn.execute(
            "INSERT INTO projects (
                id, user_id, name, description, url, start_date, end_date,
                technologies, highlights
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                project.id.to_string(),
                project.user_id.as_str(),
                project.name.as_str(),
                project.description.as_str(),
                project.url.as_deref(),
                project.start_date,
                project.end_date,
                encode_list(&project.technologies)?,
                encode_list(&project.highlights)?,
            ],
        )?;
        Ok(project.id)
    }

    fn list_projects(&self, user_id: &str) -> RepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, description, url, start_date, end_date,
                    technologies, highlights
             FROM projects
             WHERE user_id = ?1
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get("id")?;
            let technologies: String = row.get("technologies")?;
            let highlights: String = row.get("highlights")?;
            items.push(Project {
                id: parse_uuid(&id_text, "projects.id")?,
                user_id: row.get("user_id")?,
                name: row.get("name")?,
                description: row.get("description")?,
                url: row.get("url")?,
                start_date: row.get("start_date")?,
                end_date: row.get("end_date")?,
                technologies: decode_list(&technologies, "projects.technologies")?,
                highlights: decode_list(&highlights, "projects.highlights")?,
            });
        }
        Ok(items)
    }

    fn count_entries(&self, user_id: &str) -> RepoResult<EntryCounts> {
        Ok(EntryCounts {
            experiences: self.count("experiences", user_id)?,
            educations: self.count("educations", user_id)?,
            skills: self.count("skills", user_id)?,
            projects: self.count("projects", user_id)?,
        })
    }
}

fn parse_experience_row(row: &Row<'_>) -> RepoResult<Experience> {
    let id_text: String = row.get("id")?;
    let highlights: String = row.get("highlights")?;
    let keywords: String = row.get("keywords")?;
    Ok(Experience {
        id: parse_uuid(&id_text, "experiences.id")?,
        user_id: row.get("user_id")?,
        company: row.get("company")?,
        title: row.get("title")?,
        location: row.get("location")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        current: int_to_bool(row.get("current")?, "experiences.current")?,
        description: row.get("description")?,
        highlights: decode_list(&highlights, "experiences.highlights")?,
        keywords: decode_list(&keywords, "experiences.keywords")?,
    })
}

fn parse_skill_row(row: &Row<'_>) -> RepoResult<Skill> {
    let id_text: String = row.get("id")?;
    Ok(Skill {
        id: parse_uuid(&id_text, "skills.id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        category: row.get("category")?,
        proficiency: row.get("proficiency")?,
        years_exp: row.get("years_exp")?,
    })
}
