use crate::{Db, Instance, Result};

use pegasus_core::{
    err,
    schema::app::{self, FieldId, OneToOne},
    stmt::Value,
    Error,
};

impl Db {
    /// Points the key-holding relation `field` of `owner` at `target`.
    ///
    /// An owner previously pointing at `target` is detached first, and the
    /// in-memory mirrors of the old and new targets follow.
    pub(crate) fn link(
        &self,
        owner: &Instance,
        field: FieldId,
        target: Option<&Instance>,
    ) -> Result<()> {
        let model = owner.model();
        let field_def = model.field(field);
        let rel = one_to_one(field_def)?;

        let old_key = owner.value(field);
        let new_key = target.map(Value::from).unwrap_or_default();

        if old_key == new_key {
            return Ok(());
        }

        match target {
            Some(target) => self.release_target(field_def, target, Some(owner))?,
            None if !field_def.is_nullable() => {
                return Err(Error::relation_required(&model.name, &field_def.name));
            }
            None => {}
        }

        self.write_field(owner, field, new_key)?;

        if !old_key.is_null() {
            let old_target = self
                .identity
                .borrow()
                .get(rel.target, std::slice::from_ref(&old_key));

            if let Some(old_target) = old_target {
                self.update_memory(&old_target, rel.pair, Value::Null);
            }
        }

        if let Some(target) = target {
            self.update_memory(target, rel.pair, Value::from(owner));
        }

        Ok(())
    }

    /// Detaches the instance currently pointing at `target` through the
    /// key-holding `field`, unless it is `except`.
    pub(crate) fn release_target(
        &self,
        field: &app::Field,
        target: &Instance,
        except: Option<&Instance>,
    ) -> Result<()> {
        let rel = one_to_one(field)?;

        let current = target.value(rel.pair);
        if current.is_null() {
            return Ok(());
        }

        let Some(displaced) = self.get_by_key(field.id.model, &current)? else {
            return Ok(());
        };

        if except == Some(&displaced) {
            return Ok(());
        }

        if !field.is_nullable() {
            return Err(Error::relation_required(
                &displaced.model().name,
                &field.name,
            ));
        }

        self.write_field(&displaced, field.id, Value::Null)
    }

    /// Sets the non-owning relation `field` of `instance`, moving the key
    /// held by the old and new owners accordingly.
    pub(crate) fn relink_owner(
        &self,
        instance: &Instance,
        field: &app::Field,
        new_owner: Option<&Instance>,
    ) -> Result<()> {
        let rel = one_to_one(field)?;

        let old_key = instance.value(field.id);
        let old_owner = match old_key.is_null() {
            true => None,
            false => self.get_by_key(rel.target, &old_key)?,
        };

        if old_owner.as_ref() == new_owner {
            return Ok(());
        }

        let pair = self.schema.app.field(rel.pair);

        if let Some(old_owner) = &old_owner {
            if !pair.is_nullable() {
                return Err(Error::relation_required(
                    &old_owner.model().name,
                    &pair.name,
                ));
            }

            self.link(old_owner, rel.pair, None)?;
        }

        if let Some(new_owner) = new_owner {
            self.link(new_owner, rel.pair, Some(instance))?;
        }

        Ok(())
    }
}

fn one_to_one(field: &app::Field) -> Result<OneToOne> {
    field
        .ty
        .as_one_to_one()
        .copied()
        .ok_or_else(|| err!("`{}` is not a relation", field.name))
}
